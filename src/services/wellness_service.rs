use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Map as JsonMap;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::goal::GoalMap;
use crate::models::statistics::{CategoryAggregates, SessionWellnessScore, WellnessSnapshot};
use crate::models::streak::total_streak_days;
use crate::services::goal_service::GoalService;
use crate::services::session_service::SessionManager;
use crate::services::statistics_service::StatisticsService;
use crate::services::streak_service::StreakService;
use crate::store::DocumentStore;

const ROOT_FIELD: &str = "statistics";

// Archival score targets: 8h sleep, one journal entry per day, intensity
// scale midpoint 5, two activity sessions per day over the last week.
const SLEEP_TARGET_HOURS: f64 = 8.0;
const JOURNAL_TARGET_PER_WEEK: f64 = 7.0;
const MOOD_INTENSITY_SCALE: f64 = 5.0;
const ACTIVITY_TARGET_PER_WEEK: f64 = 14.0;

// Session score saturation: 20 activity sessions and 10 combined streak
// days max out their components.
const ACTIVITY_POINTS_PER_SESSION: f64 = 5.0;
const STREAK_POINTS_PER_DAY: f64 = 10.0;

/// Archival wellness score over the record-store aggregates. The mood
/// component is deliberately unclamped; everything else saturates at 100.
pub fn archival_score(aggregates: &CategoryAggregates, now: DateTime<Utc>) -> WellnessSnapshot {
    let sleep_score = (100.0 * aggregates.sleep.average_duration / SLEEP_TARGET_HOURS).min(100.0);
    let journal_score = (100.0 * aggregates.journal.entries_last_7_days as f64
        / JOURNAL_TARGET_PER_WEEK)
        .min(100.0);
    let mood_score = 100.0 * aggregates.mood.average_intensity / MOOD_INTENSITY_SCALE;
    let activity_score = (100.0 * aggregates.activity.sessions_last_7_days as f64
        / ACTIVITY_TARGET_PER_WEEK)
        .min(100.0);

    let wellness_score =
        (0.3 * sleep_score + 0.2 * journal_score + 0.3 * mood_score + 0.2 * activity_score)
            .round();

    WellnessSnapshot {
        wellness_score,
        sleep_score,
        journal_score,
        mood_score,
        activity_score,
        last_calculated: now,
    }
}

/// Client-session wellness score over activity/streak/goal state. Every
/// component is clamped to 100. Never persisted; not interchangeable with
/// the archival score.
pub fn session_score(
    total_activities: usize,
    total_streak_days: u32,
    goals: &GoalMap,
) -> SessionWellnessScore {
    let activity_component = (total_activities as f64 * ACTIVITY_POINTS_PER_SESSION).min(100.0);
    let streak_component = (total_streak_days as f64 * STREAK_POINTS_PER_DAY).min(100.0);

    let tracked: Vec<f64> = goals
        .values()
        .filter(|goal| goal.target > 0.0)
        .map(|goal| goal.achievement_percent().min(100.0))
        .collect();
    let goal_component = if tracked.is_empty() {
        0.0
    } else {
        tracked.iter().sum::<f64>() / tracked.len() as f64
    };

    let score =
        (0.3 * activity_component + 0.4 * streak_component + 0.3 * goal_component).round();

    SessionWellnessScore {
        score,
        activity_component,
        streak_component,
        goal_component,
    }
}

pub struct WellnessService {
    session: Arc<SessionManager>,
    store: Arc<dyn DocumentStore>,
    statistics: Arc<StatisticsService>,
    streaks: Arc<StreakService>,
    goals: Arc<GoalService>,
}

impl WellnessService {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<dyn DocumentStore>,
        statistics: Arc<StatisticsService>,
        streaks: Arc<StreakService>,
        goals: Arc<GoalService>,
    ) -> Self {
        Self {
            session,
            store,
            statistics,
            streaks,
            goals,
        }
    }

    /// Recompute the archival score from fresh aggregates and persist the
    /// cached copy to the user's aggregate document. Persistence is
    /// best-effort: the computed snapshot is still returned when the remote
    /// write fails.
    pub async fn refresh_archival(&self) -> AppResult<WellnessSnapshot> {
        let uid = self.session.current_uid()?;
        let aggregates = self.statistics.collect().await?;
        let snapshot = archival_score(&aggregates, Utc::now());

        info!(
            target: "app::wellness",
            score = snapshot.wellness_score,
            "archival wellness score computed"
        );

        if let Err(error) = self.persist(&uid, &aggregates, &snapshot).await {
            warn!(
                target: "app::wellness",
                error = %error,
                "failed to persist wellness snapshot"
            );
        }

        Ok(snapshot)
    }

    /// Current session score from live streak/goal state and the activity
    /// window.
    pub async fn current_session_score(&self) -> AppResult<SessionWellnessScore> {
        let aggregates = self.statistics.collect().await?;
        let streaks = self.streaks.streaks().await?;
        let goals = self.goals.goals().await?;

        Ok(session_score(
            aggregates.activity.total_sessions,
            total_streak_days(&streaks),
            &goals,
        ))
    }

    async fn persist(
        &self,
        uid: &str,
        aggregates: &CategoryAggregates,
        snapshot: &WellnessSnapshot,
    ) -> AppResult<()> {
        let mut statistics = match serde_json::to_value(aggregates)? {
            serde_json::Value::Object(map) => map,
            _ => JsonMap::new(),
        };
        statistics.insert("wellness".to_string(), serde_json::to_value(snapshot)?);

        let mut patch = JsonMap::new();
        patch.insert(
            ROOT_FIELD.to_string(),
            serde_json::Value::Object(statistics),
        );
        self.store.merge_root(uid, patch).await
    }
}
