use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::record::{
    to_field_map, ActivitySessionInput, JournalEntryInput, MoodEntryInput, Record, RecordCategory,
    SleepSessionInput,
};
use crate::services::goal_service::GoalService;
use crate::services::record_service::RecordService;
use crate::services::session_service::{IdentityProvider, SessionManager};
use crate::services::statistics_service::StatisticsService;
use crate::services::streak_service::StreakService;
use crate::services::wellness_service::WellnessService;
use crate::store::DocumentStore;

/// Explicit service wiring: identity and data-store dependencies are
/// injected once here and passed by reference to every service, instead of
/// being resolved from ambient context at call sites.
#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    session: Arc<SessionManager>,
    record_service: Arc<RecordService>,
    statistics_service: Arc<StatisticsService>,
    streak_service: Arc<StreakService>,
    goal_service: Arc<GoalService>,
    wellness_service: Arc<WellnessService>,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(provider, db_pool.clone()));
        let record_service = Arc::new(RecordService::new(
            Arc::clone(&session),
            Arc::clone(&store),
            db_pool.clone(),
        ));
        let statistics_service = Arc::new(StatisticsService::new(Arc::clone(&record_service)));
        let streak_service = Arc::new(StreakService::new(
            Arc::clone(&session),
            Arc::clone(&store),
            db_pool.clone(),
        ));
        let goal_service = Arc::new(GoalService::new(
            Arc::clone(&session),
            Arc::clone(&store),
            db_pool.clone(),
        ));
        let wellness_service = Arc::new(WellnessService::new(
            Arc::clone(&session),
            Arc::clone(&store),
            Arc::clone(&statistics_service),
            Arc::clone(&streak_service),
            Arc::clone(&goal_service),
        ));

        Self {
            db_pool,
            session,
            record_service,
            statistics_service,
            streak_service,
            goal_service,
            wellness_service,
        }
    }

    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }

    pub fn records(&self) -> Arc<RecordService> {
        Arc::clone(&self.record_service)
    }

    pub fn statistics(&self) -> Arc<StatisticsService> {
        Arc::clone(&self.statistics_service)
    }

    pub fn streaks(&self) -> Arc<StreakService> {
        Arc::clone(&self.streak_service)
    }

    pub fn goals(&self) -> Arc<GoalService> {
        Arc::clone(&self.goal_service)
    }

    pub fn wellness(&self) -> Arc<WellnessService> {
        Arc::clone(&self.wellness_service)
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }

    pub async fn log_sleep_session(&self, input: SleepSessionInput) -> AppResult<Record> {
        self.log_event(RecordCategory::SleepSessions, to_field_map(&input)?)
            .await
    }

    pub async fn log_journal_entry(&self, input: JournalEntryInput) -> AppResult<Record> {
        self.log_event(RecordCategory::JournalEntries, to_field_map(&input)?)
            .await
    }

    pub async fn log_mood_entry(&self, input: MoodEntryInput) -> AppResult<Record> {
        self.log_event(RecordCategory::MoodEntries, to_field_map(&input)?)
            .await
    }

    pub async fn log_activity_session(&self, input: ActivitySessionInput) -> AppResult<Record> {
        self.log_event(RecordCategory::ActivitySessions, to_field_map(&input)?)
            .await
    }

    /// Append a record, then recompute the derived state that hangs off the
    /// write: the category's streak and today's goal progress.
    async fn log_event(
        &self,
        category: RecordCategory,
        fields: JsonMap<String, JsonValue>,
    ) -> AppResult<Record> {
        let record = self.record_service.add(category, fields).await?;
        let today = record.created_at.date_naive();

        self.streak_service.record_activity(category, today).await?;

        let todays = self.record_service.todays_records(category, today).await?;
        self.goal_service.update_progress(category, &todays).await?;

        debug!(
            target: "app::records",
            category = %category,
            id = %record.id,
            "event logged and derived state refreshed"
        );

        Ok(record)
    }

    /// Account erasure: every record, the aggregate document and the
    /// offline mirror.
    pub async fn clear_all_user_data(&self) -> AppResult<()> {
        self.record_service.clear_all().await
    }
}
