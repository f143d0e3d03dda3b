use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::StrategyMetrics;
use crate::model::{ModelError, SuggestionModel};
use crate::rules_config::RulesConfig;
use crate::training::{TrainingAggregator, TrainingStats};

pub const RECORD_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to parse training record: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("training record carries an unusable model: {0}")]
    Model(#[from] ModelError),
}

/// Flat, forward-compatible snapshot of training progress. Unknown fields
/// are ignored and missing ones take their defaults, so older and newer
/// drivers can read each other's files. Where the bytes live is up to the
/// caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainingRecord {
    pub format_version: u32,
    pub games_played: u64,
    pub data_points: u64,
    pub model_accuracy: f32,
    pub last_training_timestamp: Option<u64>,
    pub model_version: u64,
    /// Where the next batch starts. Files written before this field existed
    /// load as 0 and fall back to `games_played`.
    pub next_game_index: u64,
    /// Opaque model blob.
    pub model: Vec<u8>,
    pub metrics: StrategyMetrics,
}

impl TrainingRecord {
    pub fn capture(aggregator: &TrainingAggregator) -> Result<Self, RecordError> {
        let stats = aggregator.stats();
        let model = aggregator.model().to_bytes()?;
        Ok(Self {
            format_version: RECORD_FORMAT_VERSION,
            games_played: stats.games_played,
            data_points: stats.data_points,
            model_accuracy: stats.model_accuracy,
            last_training_timestamp: stats.last_training_timestamp,
            model_version: stats.model_version,
            next_game_index: aggregator.next_game_index(),
            model,
            metrics: aggregator.metrics(),
        })
    }

    pub fn stats(&self) -> TrainingStats {
        TrainingStats {
            games_played: self.games_played,
            data_points: self.data_points,
            model_accuracy: self.model_accuracy.clamp(0.0, 100.0),
            last_training_timestamp: self.last_training_timestamp,
            model_version: self.model_version,
        }
    }

    /// Rebuilds an aggregator. An empty blob means an untrained model.
    pub fn into_aggregator(self, rules: Arc<RulesConfig>) -> Result<TrainingAggregator, RecordError> {
        let model = if self.model.is_empty() {
            SuggestionModel::new()
        } else {
            SuggestionModel::from_bytes(&self.model)?
        };
        let stats = self.stats();
        let next_game_index = self.next_game_index.max(self.games_played);
        Ok(TrainingAggregator::restore(
            rules,
            model,
            stats,
            self.metrics,
            next_game_index,
        ))
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{run_batch, CancelToken, SimulationConfig};

    #[test]
    fn unknown_fields_are_ignored_and_missing_defaulted() {
        let record = TrainingRecord::from_json(
            r#"{ "gamesPlayed": 12, "dataPoints": 340, "futureField": { "nested": true } }"#,
        )
        .expect("lenient parse");
        assert_eq!(record.games_played, 12);
        assert_eq!(record.data_points, 340);
        assert_eq!(record.last_training_timestamp, None);
        assert!(record.model.is_empty());
    }

    #[test]
    fn capture_and_restore_keep_counters_and_model() {
        let rules = RulesConfig::builtin();
        let aggregator = TrainingAggregator::new(rules.clone());
        aggregator.ingest(run_batch(
            2,
            SimulationConfig::from_rules(&rules).with_seed(77),
            rules.clone(),
            Arc::default(),
            CancelToken::new(),
        ));

        let record = TrainingRecord::capture(&aggregator).expect("capture");
        let json = record.to_json().expect("encode");
        let restored = TrainingRecord::from_json(&json)
            .expect("decode")
            .into_aggregator(rules)
            .expect("restore");
        assert_eq!(restored.stats(), aggregator.stats());
        assert_eq!(*restored.model(), *aggregator.model());
        assert_eq!(restored.metrics(), aggregator.metrics());
        assert_eq!(restored.next_game_index(), 2);
    }

    #[test]
    fn next_game_index_survives_failed_games() {
        let rules = Arc::new(
            RulesConfig::from_json_str(r#"{ "simulation": { "max_actions_per_game": 30 } }"#)
                .expect("config parses"),
        );
        let aggregator = TrainingAggregator::new(rules.clone());
        aggregator.ingest(run_batch(
            10,
            SimulationConfig::from_rules(&rules),
            rules.clone(),
            Arc::default(),
            CancelToken::new(),
        ));

        let record = TrainingRecord::capture(&aggregator).expect("capture");
        assert_eq!(record.games_played, 0);
        assert_eq!(record.next_game_index, 10);
        let json = record.to_json().expect("encode");
        assert!(json.contains("\"nextGameIndex\": 10"));
        let restored = TrainingRecord::from_json(&json)
            .expect("decode")
            .into_aggregator(rules)
            .expect("restore");
        assert_eq!(restored.next_game_index(), 10);
    }

    #[test]
    fn records_without_next_game_index_resume_after_played_games() {
        let record = TrainingRecord::from_json(r#"{ "gamesPlayed": 12 }"#).expect("lenient parse");
        assert_eq!(record.next_game_index, 0);
        let aggregator = record
            .into_aggregator(RulesConfig::builtin())
            .expect("restore");
        assert_eq!(aggregator.next_game_index(), 12);
    }

    #[test]
    fn corrupt_model_blob_is_rejected() {
        let record = TrainingRecord {
            model: vec![1, 2, 3],
            ..TrainingRecord::default()
        };
        assert!(matches!(
            record.into_aggregator(RulesConfig::builtin()),
            Err(RecordError::Model(_))
        ));
    }
}
