//! The two named wellness metrics: archival score over record-store
//! aggregates (persisted) and session score over activity/streak/goal state
//! (never persisted), with their documented clamping behavior.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use halcyon_core::app::AppState;
use halcyon_core::db::DbPool;
use halcyon_core::error::AppResult;
use halcyon_core::models::goal::{Goal, GoalMap};
use halcyon_core::models::record::{
    ActivitySessionInput, JournalEntryInput, MoodEntryInput, RecordCategory, SleepSessionInput,
};
use halcyon_core::models::user::UserProfile;
use halcyon_core::services::session_service::IdentityProvider;
use halcyon_core::services::wellness_service::session_score;
use halcyon_core::store::memory::MemoryDocumentStore;
use halcyon_core::store::DocumentStore;
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

#[tokio::test]
async fn archival_score_over_a_fresh_account_uses_default_aggregates() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let snapshot = state.wellness().refresh_archival().await.unwrap();

    assert_eq!(snapshot.sleep_score, 0.0);
    assert_eq!(snapshot.journal_score, 0.0);
    assert_eq!(snapshot.mood_score, 0.0);
    assert_eq!(snapshot.activity_score, 0.0);
    assert_eq!(snapshot.wellness_score, 0.0);
}

#[tokio::test]
async fn archival_score_is_persisted_with_a_last_calculated_marker() {
    let (state, store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    let before = Utc::now();
    state
        .records()
        .add_sleep_session(SleepSessionInput {
            duration_hours: 8.5,
            quality: Some("good".to_string()),
            note: None,
        })
        .await
        .unwrap();

    let snapshot = state.wellness().refresh_archival().await.unwrap();
    // 8.5h average saturates the 8h target
    assert_eq!(snapshot.sleep_score, 100.0);
    assert!(snapshot.last_calculated >= before);

    let root = store
        .read_root("user-1")
        .await
        .unwrap()
        .expect("root document exists");
    let statistics = root.get("statistics").expect("statistics field persisted");
    let wellness = statistics.get("wellness").expect("wellness snapshot cached");
    assert_eq!(
        wellness.get("sleepScore").and_then(|value| value.as_f64()),
        Some(100.0)
    );
    assert!(wellness.get("lastCalculated").is_some());
    assert!(
        statistics
            .get("sleep")
            .and_then(|value| value.get("totalSessions"))
            .is_some(),
        "category aggregates are cached alongside the score"
    );
}

#[tokio::test]
async fn clamped_components_never_exceed_one_hundred() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    // Saturate every clamped input: long sleep, daily journaling, a dense
    // activity week and an over-achieved goal.
    for _ in 0..8 {
        state
            .records()
            .add_sleep_session(SleepSessionInput {
                duration_hours: 12.0,
                quality: None,
                note: None,
            })
            .await
            .unwrap();
        state
            .records()
            .add_journal_entry(JournalEntryInput {
                title: None,
                body: "a very full day".to_string(),
            })
            .await
            .unwrap();
    }
    for _ in 0..20 {
        state
            .records()
            .add_activity_session(ActivitySessionInput {
                activity_type: "running".to_string(),
                duration_minutes: 30.0,
                intensity: None,
            })
            .await
            .unwrap();
    }

    let snapshot = state.wellness().refresh_archival().await.unwrap();
    assert_eq!(snapshot.sleep_score, 100.0);
    assert_eq!(snapshot.journal_score, 100.0);
    assert_eq!(snapshot.activity_score, 100.0);

    let session = state.wellness().current_session_score().await.unwrap();
    assert!(session.activity_component <= 100.0);
    assert!(session.streak_component <= 100.0);
    assert!(session.goal_component <= 100.0);
    assert!(session.score <= 100.0);
}

#[tokio::test]
async fn archival_mood_component_may_exceed_one_hundred() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    state
        .records()
        .add_mood_entry(MoodEntryInput {
            mood: "elated".to_string(),
            intensity: Some(9.0),
            note: None,
        })
        .await
        .unwrap();

    let snapshot = state.wellness().refresh_archival().await.unwrap();
    assert_eq!(snapshot.mood_score, 180.0, "mood component is unclamped");
}

#[tokio::test]
async fn session_score_reflects_streaks_goals_and_activity() {
    let (state, _store, _temp_dir) = setup_test_env();
    signed_in(&state).await;

    state
        .goals()
        .set_target(RecordCategory::ActivitySessions, 2.0, "sessions")
        .await
        .unwrap();
    state
        .log_activity_session(ActivitySessionInput {
            activity_type: "running".to_string(),
            duration_minutes: 30.0,
            intensity: None,
        })
        .await
        .unwrap();

    let session = state.wellness().current_session_score().await.unwrap();
    // one activity session and a one-day streak
    assert_eq!(session.activity_component, 5.0);
    assert_eq!(session.streak_component, 10.0);
    // today's single session against a target of two
    assert_eq!(session.goal_component, 50.0);
    // 0.3*5 + 0.4*10 + 0.3*50 = 20.5, rounded
    assert_eq!(session.score, 21.0);
}

#[test]
fn session_score_clamps_goal_achievement_even_when_current_exceeds_target() {
    let mut goals = GoalMap::new();
    let mut goal = Goal::new(RecordCategory::JournalEntries, 1.0, "entries");
    goal.current = 7.0;
    goals.insert(RecordCategory::JournalEntries, goal.clone());

    assert_eq!(goal.achievement_percent(), 700.0);

    let score = session_score(0, 0, &goals);
    assert_eq!(score.goal_component, 100.0);
}
