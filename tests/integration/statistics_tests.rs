//! Aggregator properties: totality on empty input, inclusive window
//! boundaries, and the documented relationships between totals and averages.

use chrono::{DateTime, Duration, Utc};
use halcyon_core::models::record::{Record, RecordCategory, DEFAULT_MOOD_INTENSITY};
use halcyon_core::models::statistics::{
    ActivityStatistics, JournalStatistics, MoodStatistics, SleepStatistics,
};
use halcyon_core::services::statistics_service::{
    calculate_activity_statistics, calculate_journal_statistics, calculate_mood_statistics,
    calculate_sleep_statistics,
};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

fn record(
    category: RecordCategory,
    created_at: DateTime<Utc>,
    pairs: &[(&str, JsonValue)],
) -> Record {
    let mut fields = JsonMap::new();
    for (key, value) in pairs {
        fields.insert(key.to_string(), value.clone());
    }
    Record {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: "user-1".to_string(),
        category,
        created_at,
        updated_at: created_at,
        fields,
    }
}

fn sleep_record(created_at: DateTime<Utc>, duration_hours: f64) -> Record {
    record(
        RecordCategory::SleepSessions,
        created_at,
        &[("durationHours", json!(duration_hours))],
    )
}

#[test]
fn average_times_count_matches_total_within_tolerance() {
    let now = Utc::now();
    let durations = [7.5, 6.25, 8.0, 5.9, 9.1, 4.75];
    let records: Vec<Record> = durations
        .iter()
        .enumerate()
        .map(|(index, duration)| sleep_record(now - Duration::hours(index as i64), *duration))
        .collect();

    let stats = calculate_sleep_statistics(&records, now);
    let reconstructed = stats.average_duration * stats.total_sessions as f64;
    assert!(
        (reconstructed - stats.total_duration).abs() < 0.1,
        "average * count = {reconstructed} should match total {}",
        stats.total_duration
    );
}

#[test]
fn empty_inputs_return_documented_default_shapes() {
    let now = Utc::now();

    assert_eq!(
        calculate_sleep_statistics(&[], now),
        SleepStatistics::default()
    );
    assert_eq!(
        calculate_journal_statistics(&[], now),
        JournalStatistics::default()
    );
    assert_eq!(calculate_mood_statistics(&[]), MoodStatistics::default());
    assert_eq!(
        calculate_activity_statistics(&[], now),
        ActivityStatistics::default()
    );
}

#[test]
fn single_sleep_session_of_eight_and_a_half_hours() {
    let now = Utc::now();
    let records = vec![sleep_record(now - Duration::hours(1), 8.5)];

    let stats = calculate_sleep_statistics(&records, now);
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.average_duration, 8.5);
    assert_eq!(stats.longest_session, 8.5);
    assert_eq!(stats.shortest_session, 8.5);
}

#[test]
fn sleep_windows_are_inclusive_of_the_boundary() {
    let now = Utc::now();
    let records = vec![
        sleep_record(now - Duration::days(3), 7.0),
        sleep_record(now - Duration::days(7), 6.0),
        sleep_record(now - Duration::days(10), 8.0),
        sleep_record(now - Duration::days(40), 5.0),
    ];

    let stats = calculate_sleep_statistics(&records, now);
    assert_eq!(stats.total_sessions, 4);
    assert_eq!(stats.sessions_last_7_days, 2);
    assert_eq!(stats.sessions_last_30_days, 3);
}

#[test]
fn sleep_extremes_track_min_and_max() {
    let now = Utc::now();
    let records = vec![
        sleep_record(now, 7.0),
        sleep_record(now, 4.5),
        sleep_record(now, 9.25),
    ];

    let stats = calculate_sleep_statistics(&records, now);
    assert_eq!(stats.longest_session, 9.25);
    assert_eq!(stats.shortest_session, 4.5);
}

#[test]
fn journal_average_word_count_spans_all_fetched_entries() {
    let now = Utc::now();
    let records = vec![
        record(
            RecordCategory::JournalEntries,
            now - Duration::days(1),
            &[("body", json!("took a long walk by the river"))],
        ),
        record(
            RecordCategory::JournalEntries,
            now - Duration::days(9),
            &[("body", json!("quiet day"))],
        ),
    ];

    let stats = calculate_journal_statistics(&records, now);
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.entries_last_7_days, 1);
    assert_eq!(stats.entries_last_30_days, 2);
    // (7 + 2) words over 2 entries
    assert_eq!(stats.average_word_count, 4.5);
}

#[test]
fn journal_entry_without_body_counts_zero_words() {
    let now = Utc::now();
    let records = vec![
        record(RecordCategory::JournalEntries, now, &[]),
        record(
            RecordCategory::JournalEntries,
            now,
            &[("body", json!("two words"))],
        ),
    ];

    let stats = calculate_journal_statistics(&records, now);
    assert_eq!(stats.average_word_count, 1.0);
}

#[test]
fn most_frequent_mood_breaks_ties_left_to_right() {
    let now = Utc::now();
    let records = vec![
        record(RecordCategory::MoodEntries, now, &[("mood", json!("tired"))]),
        record(RecordCategory::MoodEntries, now, &[("mood", json!("happy"))]),
        record(RecordCategory::MoodEntries, now, &[("mood", json!("happy"))]),
        record(RecordCategory::MoodEntries, now, &[("mood", json!("tired"))]),
    ];

    let stats = calculate_mood_statistics(&records);
    assert_eq!(stats.most_frequent_mood, "tired");
    assert_eq!(stats.total_entries, 4);
}

#[test]
fn missing_mood_intensity_defaults_to_midpoint() {
    let now = Utc::now();
    let records = vec![
        record(RecordCategory::MoodEntries, now, &[("mood", json!("calm"))]),
        record(
            RecordCategory::MoodEntries,
            now,
            &[("mood", json!("calm")), ("intensity", json!(3.0))],
        ),
    ];

    let stats = calculate_mood_statistics(&records);
    assert_eq!(
        stats.average_intensity,
        (DEFAULT_MOOD_INTENSITY + 3.0) / 2.0
    );
}

#[test]
fn corrupt_mood_entry_does_not_abort_the_computation() {
    let now = Utc::now();
    let records = vec![
        record(
            RecordCategory::MoodEntries,
            now,
            &[("mood", json!(17)), ("intensity", json!("high"))],
        ),
        record(
            RecordCategory::MoodEntries,
            now,
            &[("mood", json!("content")), ("intensity", json!(6.0))],
        ),
    ];

    let stats = calculate_mood_statistics(&records);
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.average_intensity, (DEFAULT_MOOD_INTENSITY + 6.0) / 2.0);
}

#[test]
fn activity_breakdown_groups_per_type_with_averages() {
    let now = Utc::now();
    let records = vec![
        record(
            RecordCategory::ActivitySessions,
            now - Duration::days(1),
            &[("activityType", json!("running")), ("durationMinutes", json!(30.0))],
        ),
        record(
            RecordCategory::ActivitySessions,
            now - Duration::days(2),
            &[("activityType", json!("running")), ("durationMinutes", json!(50.0))],
        ),
        record(
            RecordCategory::ActivitySessions,
            now - Duration::days(10),
            &[("activityType", json!("yoga")), ("durationMinutes", json!(45.0))],
        ),
    ];

    let stats = calculate_activity_statistics(&records, now);
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.sessions_last_7_days, 2);

    assert_eq!(stats.type_breakdown.len(), 2);
    assert_eq!(stats.type_breakdown[0].activity_type, "running");
    assert_eq!(stats.type_breakdown[0].sessions, 2);
    assert_eq!(stats.type_breakdown[0].average_duration, 40.0);
    assert_eq!(stats.type_breakdown[1].activity_type, "yoga");
    assert_eq!(stats.type_breakdown[1].sessions, 1);
}

#[test]
fn activity_without_type_lands_in_the_unknown_bucket() {
    let now = Utc::now();
    let records = vec![
        record(
            RecordCategory::ActivitySessions,
            now,
            &[("durationMinutes", json!(20.0))],
        ),
        record(
            RecordCategory::ActivitySessions,
            now,
            &[("activityType", json!("walking")), ("durationMinutes", json!(25.0))],
        ),
    ];

    let stats = calculate_activity_statistics(&records, now);
    assert_eq!(stats.type_breakdown[0].activity_type, "unknown");
    assert_eq!(stats.type_breakdown[0].sessions, 1);
}
