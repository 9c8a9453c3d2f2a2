use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::record::RecordCategory;

/// Contiguous-day counter for one category. Invariant: `count` is the number
/// of consecutive calendar days ending at `last_date` that contain at least
/// one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    #[serde(default)]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

/// Outcome of feeding one day's activity into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// A record for today was already counted.
    AlreadyCounted,
    /// First day of a fresh streak.
    Started,
    /// Yesterday was active, the chain continues.
    Continued,
    /// Gap of two or more days: the old chain is dropped and a new one-day
    /// streak begins today.
    Reset,
}

pub type StreakMap = BTreeMap<RecordCategory, Streak>;

/// Combined streak days across all categories, used by the session score.
pub fn total_streak_days(streaks: &StreakMap) -> u32 {
    streaks.values().map(|streak| streak.count).sum()
}
