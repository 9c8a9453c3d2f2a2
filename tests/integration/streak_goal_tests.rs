//! Streak continuity and goal progress against the in-process document
//! store, including persistence to the aggregate document and the offline
//! mirror fallback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use halcyon_core::app::AppState;
use halcyon_core::db::DbPool;
use halcyon_core::error::AppResult;
use halcyon_core::models::record::{Record, RecordCategory};
use halcyon_core::models::user::UserProfile;
use halcyon_core::services::session_service::IdentityProvider;
use halcyon_core::store::memory::MemoryDocumentStore;
use halcyon_core::store::DocumentStore;
use serde_json::Map as JsonMap;
use tempfile::{tempdir, TempDir};

struct StaticProvider;

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn sign_in(&self, email: &str, _password: &str) -> AppResult<UserProfile> {
        Ok(UserProfile {
            uid: "user-1".to_string(),
            email: email.to_string(),
            display_name: None,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _display_name: Option<&str>,
    ) -> AppResult<UserProfile> {
        Ok(UserProfile {
            uid: "user-1".to_string(),
            email: email.to_string(),
            display_name: None,
        })
    }

    async fn sign_out(&self, _uid: &str) -> AppResult<()> {
        Ok(())
    }
}

fn setup_test_env() -> (AppState, Arc<MemoryDocumentStore>, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let db = DbPool::new(temp_dir.path().join("cache.sqlite"))
        .expect("Failed to create offline cache database");
    let store = Arc::new(MemoryDocumentStore::new());
    let state = AppState::new(
        db,
        Arc::new(StaticProvider),
        Arc::clone(&store) as Arc<dyn DocumentStore>,
    );
    (state, store, temp_dir)
}

async fn signed_in(state: &AppState) {
    state
        .session()
        .sign_in("test@example.com", "hunter2")
        .await
        .expect("sign in should succeed");
}

fn day(year: i32, month: u32, day_of_month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day_of_month).expect("valid date")
}

fn fake_record(category: RecordCategory, index: usize) -> Record {
    let now = Utc::now();
    Record {
        id: format!("record-{index}"),
        user_id: "user-1".to_string(),
        category,
        created_at: now,
        updated_at: now,
        fields: JsonMap::new(),
    }
}

#[tokio::test]
async fn three_consecutive_days_count_three_from_the_first_day() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let streaks = state.streaks();
    streaks
        .record_activity(RecordCategory::JournalEntries, day(2026, 8, 1))
        .await
        .unwrap();
    streaks
        .record_activity(RecordCategory::JournalEntries, day(2026, 8, 2))
        .await
        .unwrap();
    let third = streaks
        .record_activity(RecordCategory::JournalEntries, day(2026, 8, 3))
        .await
        .unwrap();

    assert_eq!(third.count, 3);
    assert_eq!(third.start_date, Some(day(2026, 8, 1)));
    assert_eq!(third.last_date, Some(day(2026, 8, 3)));
}

#[tokio::test]
async fn second_event_on_the_same_day_does_not_double_count() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let streaks = state.streaks();
    streaks
        .record_activity(RecordCategory::MoodEntries, day(2026, 8, 1))
        .await
        .unwrap();
    let repeated = streaks
        .record_activity(RecordCategory::MoodEntries, day(2026, 8, 1))
        .await
        .unwrap();

    assert_eq!(repeated.count, 1);
}

#[tokio::test]
async fn gap_of_five_days_resets_the_streak_to_one() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let streaks = state.streaks();
    streaks
        .record_activity(RecordCategory::ActivitySessions, day(2026, 8, 1))
        .await
        .unwrap();
    let after_gap = streaks
        .record_activity(RecordCategory::ActivitySessions, day(2026, 8, 6))
        .await
        .unwrap();

    assert_eq!(after_gap.count, 1, "a multi-day gap starts over");
    assert_eq!(after_gap.start_date, Some(day(2026, 8, 6)));
}

#[tokio::test]
async fn streaks_persist_to_the_aggregate_document_per_category() {
    let (state, store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let streaks = state.streaks();
    streaks
        .record_activity(RecordCategory::SleepSessions, day(2026, 8, 1))
        .await
        .unwrap();
    streaks
        .record_activity(RecordCategory::JournalEntries, day(2026, 8, 1))
        .await
        .unwrap();

    let root = store
        .read_root("user-1")
        .await
        .unwrap()
        .expect("root document exists");
    let persisted = root.get("streaks").expect("streaks field persisted");
    assert!(persisted.get("sleep_sessions").is_some());
    assert!(persisted.get("journal_entries").is_some());
}

#[tokio::test]
async fn streaks_fall_back_to_the_offline_mirror() {
    let (state, store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let streaks = state.streaks();
    streaks
        .record_activity(RecordCategory::MoodEntries, day(2026, 8, 1))
        .await
        .unwrap();

    store.set_offline(true);

    let cached = streaks.streaks().await.unwrap();
    assert_eq!(cached.get(&RecordCategory::MoodEntries).unwrap().count, 1);
}

#[tokio::test]
async fn goal_progress_is_recomputed_from_todays_records() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let goals = state.goals();
    goals
        .set_target(RecordCategory::ActivitySessions, 2.0, "sessions")
        .await
        .unwrap();

    let todays: Vec<Record> = (0..3)
        .map(|index| fake_record(RecordCategory::ActivitySessions, index))
        .collect();
    let goal = goals
        .update_progress(RecordCategory::ActivitySessions, &todays)
        .await
        .unwrap();

    assert_eq!(goal.current, 3.0);
    assert_eq!(goal.target, 2.0);
    // Over-achievement stays unclamped on the goal itself.
    assert_eq!(goal.achievement_percent(), 150.0);
}

#[tokio::test]
async fn set_target_preserves_current_progress() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let goals = state.goals();
    let todays: Vec<Record> = (0..2)
        .map(|index| fake_record(RecordCategory::JournalEntries, index))
        .collect();
    goals
        .update_progress(RecordCategory::JournalEntries, &todays)
        .await
        .unwrap();

    let retuned = goals
        .set_target(RecordCategory::JournalEntries, 5.0, "entries")
        .await
        .unwrap();

    assert_eq!(retuned.target, 5.0);
    assert_eq!(retuned.current, 2.0);
}

#[tokio::test]
async fn goals_persist_and_fall_back_to_the_offline_mirror() {
    let (state, store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let goals = state.goals();
    goals
        .set_target(RecordCategory::SleepSessions, 1.0, "sessions")
        .await
        .unwrap();

    let root = store
        .read_root("user-1")
        .await
        .unwrap()
        .expect("root document exists");
    assert!(root.get("goals").and_then(|v| v.get("sleep_sessions")).is_some());

    store.set_offline(true);
    let cached = goals.goals().await.unwrap();
    assert_eq!(
        cached.get(&RecordCategory::SleepSessions).unwrap().target,
        1.0
    );
}
