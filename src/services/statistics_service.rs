use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::AppResult;
use crate::models::record::{Record, RecordCategory};
use crate::models::statistics::{
    ActivityStatistics, ActivityTypeStats, CategoryAggregates, JournalStatistics, MoodStatistics,
    SleepStatistics,
};
use crate::services::record_service::RecordService;
use crate::store::ListQuery;

/// Stateless aggregate computations. Every function is total: empty input
/// yields the zero-valued default shape, malformed fields fall back to the
/// record accessors' defaults, and nothing here performs I/O.

pub fn calculate_sleep_statistics(
    records: &[Record],
    reference: DateTime<Utc>,
) -> SleepStatistics {
    if records.is_empty() {
        return SleepStatistics::default();
    }

    let week_boundary = reference - Duration::days(7);
    let month_boundary = reference - Duration::days(30);

    let mut total_duration = 0.0;
    let mut longest = f64::NEG_INFINITY;
    let mut shortest = f64::INFINITY;
    let mut sessions_last_7_days = 0;
    let mut sessions_last_30_days = 0;

    for record in records {
        let duration = record.duration_hours();
        total_duration += duration;
        longest = longest.max(duration);
        shortest = shortest.min(duration);

        if record.created_at >= week_boundary {
            sessions_last_7_days += 1;
        }
        if record.created_at >= month_boundary {
            sessions_last_30_days += 1;
        }
    }

    SleepStatistics {
        total_sessions: records.len(),
        total_duration,
        average_duration: total_duration / records.len() as f64,
        longest_session: longest,
        shortest_session: shortest,
        sessions_last_7_days,
        sessions_last_30_days,
    }
}

pub fn calculate_journal_statistics(
    records: &[Record],
    reference: DateTime<Utc>,
) -> JournalStatistics {
    if records.is_empty() {
        return JournalStatistics::default();
    }

    let week_boundary = reference - Duration::days(7);
    let month_boundary = reference - Duration::days(30);

    let mut entries_last_7_days = 0;
    let mut entries_last_30_days = 0;
    let mut total_words = 0usize;

    for record in records {
        total_words += record.word_count();
        if record.created_at >= week_boundary {
            entries_last_7_days += 1;
        }
        if record.created_at >= month_boundary {
            entries_last_30_days += 1;
        }
    }

    JournalStatistics {
        total_entries: records.len(),
        entries_last_7_days,
        entries_last_30_days,
        average_word_count: total_words as f64 / records.len() as f64,
    }
}

pub fn calculate_mood_statistics(records: &[Record]) -> MoodStatistics {
    if records.is_empty() {
        return MoodStatistics::default();
    }

    // Ties break toward the label seen first in a left-to-right scan.
    let mut occurrences: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut total_intensity = 0.0;

    for (index, record) in records.iter().enumerate() {
        total_intensity += record.mood_intensity();
        let entry = occurrences.entry(record.mood()).or_insert((0, index));
        entry.0 += 1;
    }

    let most_frequent_mood = occurrences
        .iter()
        .min_by_key(|(_, value)| (std::cmp::Reverse(value.0), value.1))
        .map(|(mood, _)| mood.to_string())
        .unwrap_or_default();

    MoodStatistics {
        total_entries: records.len(),
        most_frequent_mood,
        average_intensity: total_intensity / records.len() as f64,
    }
}

pub fn calculate_activity_statistics(
    records: &[Record],
    reference: DateTime<Utc>,
) -> ActivityStatistics {
    if records.is_empty() {
        return ActivityStatistics::default();
    }

    let week_boundary = reference - Duration::days(7);

    let mut order: Vec<String> = Vec::new();
    let mut per_type: HashMap<String, (usize, f64)> = HashMap::new();
    let mut sessions_last_7_days = 0;

    for record in records {
        let activity_type = record.activity_type().to_string();
        if !per_type.contains_key(&activity_type) {
            order.push(activity_type.clone());
        }
        let entry = per_type.entry(activity_type).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.duration_minutes();

        if record.created_at >= week_boundary {
            sessions_last_7_days += 1;
        }
    }

    let type_breakdown = order
        .into_iter()
        .map(|activity_type| {
            let (sessions, total_duration) = per_type[&activity_type];
            ActivityTypeStats {
                activity_type,
                sessions,
                average_duration: total_duration / sessions as f64,
            }
        })
        .collect();

    ActivityStatistics {
        total_sessions: records.len(),
        sessions_last_7_days,
        type_breakdown,
    }
}

/// Fetches bounded record windows through the record store and computes the
/// four category aggregates.
pub struct StatisticsService {
    records: Arc<RecordService>,
}

impl StatisticsService {
    pub fn new(records: Arc<RecordService>) -> Self {
        Self { records }
    }

    pub async fn collect(&self) -> AppResult<CategoryAggregates> {
        self.collect_with_reference(Utc::now()).await
    }

    pub async fn collect_with_reference(
        &self,
        reference: DateTime<Utc>,
    ) -> AppResult<CategoryAggregates> {
        let sleep = self
            .records
            .list(RecordCategory::SleepSessions, ListQuery::default())
            .await?;
        let journal = self
            .records
            .list(RecordCategory::JournalEntries, ListQuery::default())
            .await?;
        let mood = self
            .records
            .list(RecordCategory::MoodEntries, ListQuery::default())
            .await?;
        let activity = self
            .records
            .list(RecordCategory::ActivitySessions, ListQuery::default())
            .await?;

        debug!(
            target: "app::stats",
            sleep = sleep.len(),
            journal = journal.len(),
            mood = mood.len(),
            activity = activity.len(),
            "collected aggregate windows"
        );

        Ok(CategoryAggregates {
            sleep: calculate_sleep_statistics(&sleep, reference),
            journal: calculate_journal_statistics(&journal, reference),
            mood: calculate_mood_statistics(&mood),
            activity: calculate_activity_statistics(&activity, reference),
        })
    }
}
