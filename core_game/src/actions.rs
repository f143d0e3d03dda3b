use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The nine turn actions, in catalog order. Catalog order is also the
/// tie-break order everywhere actions are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionId {
    Build,
    PlayCard,
    Exchange,
    Workforce,
    Upgrade,
    OldWorld,
    NewWorld,
    Expedition,
    Festival,
}

impl ActionId {
    pub const COUNT: usize = 9;

    pub const ALL: [ActionId; ActionId::COUNT] = [
        ActionId::Build,
        ActionId::PlayCard,
        ActionId::Exchange,
        ActionId::Workforce,
        ActionId::Upgrade,
        ActionId::OldWorld,
        ActionId::NewWorld,
        ActionId::Expedition,
        ActionId::Festival,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionId::Build => "build",
            ActionId::PlayCard => "playCard",
            ActionId::Exchange => "exchange",
            ActionId::Workforce => "workforce",
            ActionId::Upgrade => "upgrade",
            ActionId::OldWorld => "oldWorld",
            ActionId::NewWorld => "newWorld",
            ActionId::Expedition => "expedition",
            ActionId::Festival => "festival",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActionId::Build => "Exhaust workers to raise a building and earn gold",
            ActionId::PlayCard => "Play a card from hand for points",
            ActionId::Exchange => "Discard up to three cards and draw replacements",
            ActionId::Workforce => "Pay gold to house a new resident",
            ActionId::Upgrade => "Promote a resident to the next tier",
            ActionId::OldWorld => "Send a trade ship to claim an Old World island",
            ActionId::NewWorld => "Send an exploration ship to chart a New World island",
            ActionId::Expedition => "Launch an expedition for an expedition card",
            ActionId::Festival => "Hold a city festival to refresh everything exhausted",
        }
    }

    pub fn flag(self) -> ActionSet {
        ActionSet::from_bits_truncate(1 << self.index())
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for ActionId {
    type Err = UnknownAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ActionId::ALL
            .iter()
            .copied()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownAction(value.to_string()))
    }
}

bitflags! {
    /// Compact set of actions, one bit per catalog entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ActionSet: u16 {
        const BUILD = 1 << 0;
        const PLAY_CARD = 1 << 1;
        const EXCHANGE = 1 << 2;
        const WORKFORCE = 1 << 3;
        const UPGRADE = 1 << 4;
        const OLD_WORLD = 1 << 5;
        const NEW_WORLD = 1 << 6;
        const EXPEDITION = 1 << 7;
        const FESTIVAL = 1 << 8;
    }
}

impl ActionSet {
    pub fn has(self, action: ActionId) -> bool {
        self.contains(action.flag())
    }

    pub fn insert_action(&mut self, action: ActionId) {
        self.insert(action.flag());
    }

    /// Members in catalog order.
    pub fn actions(self) -> impl Iterator<Item = ActionId> {
        ActionId::ALL
            .into_iter()
            .filter(move |action| self.has(*action))
    }

    pub fn len(self) -> usize {
        self.bits().count_ones() as usize
    }
}

impl FromIterator<ActionId> for ActionSet {
    fn from_iter<I: IntoIterator<Item = ActionId>>(iter: I) -> Self {
        let mut set = ActionSet::empty();
        for action in iter {
            set.insert_action(action);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for action in ActionId::ALL {
            assert_eq!(action.as_str().parse::<ActionId>(), Ok(action));
        }
        assert_eq!("oldworld".parse::<ActionId>(), Ok(ActionId::OldWorld));
        assert!("bribe".parse::<ActionId>().is_err());
    }

    #[test]
    fn flags_line_up_with_named_constants() {
        assert_eq!(ActionId::Build.flag(), ActionSet::BUILD);
        assert_eq!(ActionId::OldWorld.flag(), ActionSet::OLD_WORLD);
        assert_eq!(ActionId::Festival.flag(), ActionSet::FESTIVAL);
        assert_eq!(ActionSet::all().len(), ActionId::COUNT);
    }

    #[test]
    fn set_iterates_in_catalog_order() {
        let set: ActionSet = [ActionId::Festival, ActionId::Build, ActionId::Upgrade]
            .into_iter()
            .collect();
        let ordered: Vec<_> = set.actions().collect();
        assert_eq!(
            ordered,
            vec![ActionId::Build, ActionId::Upgrade, ActionId::Festival]
        );
    }

    #[test]
    fn serde_uses_camel_case_names() {
        let json = serde_json::to_string(&ActionId::PlayCard).expect("serialize");
        assert_eq!(json, "\"playCard\"");
    }
}
