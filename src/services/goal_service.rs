use std::sync::Arc;

use serde_json::Map as JsonMap;
use tracing::{info, warn};

use crate::db::repositories::cache_repository::{namespaces, CacheRepository};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::goal::{Goal, GoalMap};
use crate::models::record::{Record, RecordCategory};
use crate::services::session_service::SessionManager;
use crate::store::DocumentStore;

const ROOT_FIELD: &str = "goals";
const MIRROR_KEY: &str = "all";

fn default_unit(category: RecordCategory) -> &'static str {
    match category {
        RecordCategory::SleepSessions | RecordCategory::ActivitySessions => "sessions",
        RecordCategory::JournalEntries | RecordCategory::MoodEntries => "entries",
    }
}

/// Per-category daily targets. `current` is always recomputed from today's
/// records, never hand-edited; over-achievement is allowed and left
/// unclamped here.
pub struct GoalService {
    session: Arc<SessionManager>,
    store: Arc<dyn DocumentStore>,
    db: DbPool,
}

impl GoalService {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn DocumentStore>, db: DbPool) -> Self {
        Self { session, store, db }
    }

    /// Create or retune a goal's target without touching its progress.
    pub async fn set_target(
        &self,
        category: RecordCategory,
        target: f64,
        unit: &str,
    ) -> AppResult<Goal> {
        let uid = self.session.current_uid()?;
        let mut goals = self.load_remote(&uid).await?;

        let goal = goals
            .entry(category)
            .or_insert_with(|| Goal::new(category, target, unit));
        goal.target = target;
        goal.unit = unit.to_string();
        let goal = goal.clone();

        self.persist(&uid, &goals).await?;
        info!(
            target: "app::goal",
            category = %category,
            goal_target = target,
            "goal target set"
        );
        Ok(goal)
    }

    /// Recompute today's progress for one category from the day's records.
    pub async fn update_progress(
        &self,
        category: RecordCategory,
        todays_records: &[Record],
    ) -> AppResult<Goal> {
        let uid = self.session.current_uid()?;
        let mut goals = self.load_remote(&uid).await?;

        let goal = goals
            .entry(category)
            .or_insert_with(|| Goal::new(category, 0.0, default_unit(category)));
        goal.current = todays_records.len() as f64;
        let goal = goal.clone();

        self.persist(&uid, &goals).await?;
        Ok(goal)
    }

    /// Current goals map; serves the offline mirror when the remote store is
    /// unreachable.
    pub async fn goals(&self) -> AppResult<GoalMap> {
        let uid = self.session.current_uid()?;

        match self.load_remote(&uid).await {
            Ok(goals) => Ok(goals),
            Err(error) if error.is_unavailable() => {
                warn!(
                    target: "app::goal",
                    error = %error,
                    "remote goals unavailable, serving offline mirror"
                );
                Ok(self.read_mirror(&uid).await)
            }
            Err(error) => Err(error),
        }
    }

    async fn load_remote(&self, uid: &str) -> AppResult<GoalMap> {
        let root = self.store.read_root(uid).await?;
        let Some(root) = root else {
            return Ok(GoalMap::new());
        };

        match root.get(ROOT_FIELD) {
            Some(value) => Ok(serde_json::from_value(value.clone()).unwrap_or_else(|error| {
                warn!(target: "app::goal", error = %error, "goal map corrupt, starting over");
                GoalMap::new()
            })),
            None => Ok(GoalMap::new()),
        }
    }

    async fn persist(&self, uid: &str, goals: &GoalMap) -> AppResult<()> {
        let mut patch = JsonMap::new();
        patch.insert(ROOT_FIELD.to_string(), serde_json::to_value(goals)?);
        self.store.merge_root(uid, patch).await?;

        self.write_mirror(uid, goals).await;
        Ok(())
    }

    async fn write_mirror(&self, uid: &str, goals: &GoalMap) {
        let payload = match serde_json::to_string(goals) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(target: "app::goal", error = %error, "failed to serialize goal mirror");
                return;
            }
        };

        let db = self.db.clone();
        let owner = uid.to_string();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::put(conn, &owner, namespaces::GOALS, MIRROR_KEY, &payload)
            })
        })
        .await;

        if let Ok(Err(error)) = result {
            warn!(target: "app::goal", error = %error, "goal mirror write failed");
        }
    }

    async fn read_mirror(&self, uid: &str) -> GoalMap {
        let db = self.db.clone();
        let owner = uid.to_string();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::get(conn, &owner, namespaces::GOALS, MIRROR_KEY)
            })
        })
        .await;

        match result {
            Ok(Ok(Some(payload))) => serde_json::from_str(&payload).unwrap_or_default(),
            _ => GoalMap::new(),
        }
    }
}
