use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::record::RecordCategory;

/// Per-category daily target. `current` is recomputed from today's records,
/// never hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub category: RecordCategory,
    pub target: f64,
    pub unit: String,
    #[serde(default)]
    pub current: f64,
}

impl Goal {
    pub fn new(category: RecordCategory, target: f64, unit: impl Into<String>) -> Self {
        Self {
            category,
            target,
            unit: unit.into(),
            current: 0.0,
        }
    }

    /// Unclamped ratio; display layers may report over-achievement as >100%.
    pub fn achievement_percent(&self) -> f64 {
        if self.target > 0.0 {
            self.current / self.target * 100.0
        } else {
            0.0
        }
    }
}

/// Full goals map persisted to the user's aggregate document, keyed by the
/// category's collection name.
pub type GoalMap = BTreeMap<RecordCategory, Goal>;
