use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::record::DEFAULT_MOOD;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SleepStatistics {
    pub total_sessions: usize,
    pub total_duration: f64,
    pub average_duration: f64,
    pub longest_session: f64,
    pub shortest_session: f64,
    pub sessions_last_7_days: usize,
    pub sessions_last_30_days: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalStatistics {
    pub total_entries: usize,
    pub entries_last_7_days: usize,
    pub entries_last_30_days: usize,
    pub average_word_count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodStatistics {
    pub total_entries: usize,
    pub most_frequent_mood: String,
    pub average_intensity: f64,
}

impl Default for MoodStatistics {
    fn default() -> Self {
        Self {
            total_entries: 0,
            most_frequent_mood: DEFAULT_MOOD.to_string(),
            average_intensity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTypeStats {
    pub activity_type: String,
    pub sessions: usize,
    pub average_duration: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatistics {
    pub total_sessions: usize,
    pub sessions_last_7_days: usize,
    /// Per-type breakdown in first-encountered order of the fetched window.
    pub type_breakdown: Vec<ActivityTypeStats>,
}

/// All four category aggregates for one user over the fetched windows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregates {
    pub sleep: SleepStatistics,
    pub journal: JournalStatistics,
    pub mood: MoodStatistics,
    pub activity: ActivityStatistics,
}

/// Archival wellness score derived from the record-store aggregates. The mood
/// component is intentionally left unclamped; the other components saturate
/// at 100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WellnessSnapshot {
    pub wellness_score: f64,
    pub sleep_score: f64,
    pub journal_score: f64,
    pub mood_score: f64,
    pub activity_score: f64,
    pub last_calculated: DateTime<Utc>,
}

/// Client-session wellness score over activity/streak/goal state. Every
/// component is clamped to 100; this metric is never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionWellnessScore {
    pub score: f64,
    pub activity_component: f64,
    pub streak_component: f64,
    pub goal_component: f64,
}
