use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::{ActionId, ActionSet};
use crate::features::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to encode suggestion model: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode suggestion model: {0}")]
    Decode(#[source] bincode::Error),
    #[error("model shape {actions}x{features} does not match the action catalog")]
    ShapeMismatch { actions: usize, features: usize },
    #[error("model trained on {data_points} samples, needs {required}")]
    Unavailable { data_points: u64, required: u64 },
}

/// Softmax regression over the action catalog. One weight row per action.
///
/// The artifact is immutable once published; training works on a copy and
/// publishes a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionModel {
    version: u64,
    data_points: u64,
    weights: Vec<[f32; FEATURE_COUNT]>,
}

impl Default for SuggestionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionModel {
    pub fn new() -> Self {
        Self {
            version: 0,
            data_points: 0,
            weights: vec![[0.0; FEATURE_COUNT]; ActionId::COUNT],
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data_points(&self) -> u64 {
        self.data_points
    }

    /// `Unavailable` until enough samples have been folded in.
    pub fn ensure_ready(&self, required: u64) -> Result<(), ModelError> {
        if self.data_points < required {
            return Err(ModelError::Unavailable {
                data_points: self.data_points,
                required,
            });
        }
        Ok(())
    }

    pub fn logits(&self, features: &FeatureVector) -> [f32; ActionId::COUNT] {
        let mut logits = [0.0; ActionId::COUNT];
        for (logit, row) in logits.iter_mut().zip(&self.weights) {
            *logit = row.iter().zip(features).map(|(w, x)| w * x).sum();
        }
        logits
    }

    /// Softmax restricted to `legal`; illegal actions get probability 0.
    pub fn probabilities(&self, features: &FeatureVector, legal: ActionSet) -> [f32; ActionId::COUNT] {
        masked_softmax(&self.logits(features), legal, 1.0)
    }

    /// Most probable legal action, ties to catalog order.
    pub fn predict(&self, features: &FeatureVector, legal: ActionSet) -> Option<ActionId> {
        let probabilities = self.probabilities(features, legal);
        legal.actions().fold(None, |best: Option<ActionId>, action| match best {
            Some(current) if probabilities[current.index()] >= probabilities[action.index()] => {
                Some(current)
            }
            _ => Some(action),
        })
    }

    /// One weighted cross-entropy gradient step toward `target`.
    pub fn sgd_step(
        &mut self,
        features: &FeatureVector,
        legal: ActionSet,
        target: ActionId,
        weight: f32,
        learning_rate: f32,
        l2: f32,
    ) {
        let legal = legal | target.flag();
        let probabilities = self.probabilities(features, legal);
        for action in legal.actions() {
            let indicator = if action == target { 1.0 } else { 0.0 };
            let error = probabilities[action.index()] - indicator;
            let row = &mut self.weights[action.index()];
            for (w, x) in row.iter_mut().zip(features) {
                *w -= learning_rate * (weight * error * x + l2 * *w);
            }
        }
    }

    pub(crate) fn record_samples(&mut self, count: u64) {
        self.data_points += count;
        self.version += 1;
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        bincode::serialize(self).map_err(ModelError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: SuggestionModel = bincode::deserialize(bytes).map_err(ModelError::Decode)?;
        if model.weights.len() != ActionId::COUNT {
            return Err(ModelError::ShapeMismatch {
                actions: model.weights.len(),
                features: FEATURE_COUNT,
            });
        }
        Ok(model)
    }
}

/// Numerically stable softmax over the members of `legal`.
pub fn masked_softmax(
    values: &[f32; ActionId::COUNT],
    legal: ActionSet,
    temperature: f32,
) -> [f32; ActionId::COUNT] {
    let mut out = [0.0; ActionId::COUNT];
    let max = legal
        .actions()
        .map(|action| values[action.index()])
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return out;
    }
    let mut total = 0.0;
    for action in legal.actions() {
        let value = ((values[action.index()] - max) / temperature).exp();
        out[action.index()] = value;
        total += value;
    }
    if total > 0.0 {
        for value in out.iter_mut() {
            *value /= total;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureVector {
        let mut features = [0.0; FEATURE_COUNT];
        features[0] = 1.0;
        features[3] = 0.5;
        features
    }

    #[test]
    fn untrained_model_is_uniform_over_legal_actions() {
        let model = SuggestionModel::new();
        let legal = ActionSet::BUILD | ActionSet::FESTIVAL;
        let probabilities = model.probabilities(&features(), legal);
        assert!((probabilities[ActionId::Build.index()] - 0.5).abs() < 1e-6);
        assert_eq!(probabilities[ActionId::PlayCard.index()], 0.0);
        assert_eq!(model.predict(&features(), legal), Some(ActionId::Build));
        assert_eq!(model.predict(&features(), ActionSet::empty()), None);
    }

    #[test]
    fn sgd_moves_prediction_toward_target() {
        let mut model = SuggestionModel::new();
        let legal = ActionSet::BUILD | ActionSet::EXPEDITION | ActionSet::FESTIVAL;
        for _ in 0..50 {
            model.sgd_step(&features(), legal, ActionId::Expedition, 1.0, 0.1, 0.0);
        }
        assert_eq!(model.predict(&features(), legal), Some(ActionId::Expedition));
        let probabilities = model.probabilities(&features(), legal);
        assert!(probabilities[ActionId::Expedition.index()] > 0.8);
    }

    #[test]
    fn readiness_tracks_data_points() {
        let mut model = SuggestionModel::new();
        assert!(matches!(
            model.ensure_ready(10),
            Err(ModelError::Unavailable {
                data_points: 0,
                required: 10
            })
        ));
        model.record_samples(10);
        assert!(model.ensure_ready(10).is_ok());
        assert_eq!(model.version(), 1);
    }

    #[test]
    fn bytes_restore_the_same_model() {
        let mut model = SuggestionModel::new();
        model.sgd_step(&features(), ActionSet::all(), ActionId::Upgrade, 1.0, 0.2, 0.0);
        model.record_samples(1);
        let bytes = model.to_bytes().expect("encode");
        let restored = SuggestionModel::from_bytes(&bytes).expect("decode");
        assert_eq!(restored, model);
        assert!(SuggestionModel::from_bytes(&bytes[..3]).is_err());
    }

    #[test]
    fn softmax_ignores_illegal_entries() {
        let mut values = [0.0; ActionId::COUNT];
        values[ActionId::Build.index()] = 100.0;
        let out = masked_softmax(&values, ActionSet::FESTIVAL, 1.0);
        assert_eq!(out[ActionId::Festival.index()], 1.0);
        assert_eq!(out[ActionId::Build.index()], 0.0);
        assert_eq!(masked_softmax(&values, ActionSet::empty(), 1.0), [0.0; 9]);
    }
}
