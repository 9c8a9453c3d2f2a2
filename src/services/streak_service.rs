use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde_json::Map as JsonMap;
use tracing::{info, warn};

use crate::db::repositories::cache_repository::{namespaces, CacheRepository};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::record::RecordCategory;
use crate::models::streak::{Streak, StreakMap, StreakTransition};
use crate::services::session_service::SessionManager;
use crate::store::DocumentStore;

const ROOT_FIELD: &str = "streaks";
const MIRROR_KEY: &str = "all";

/// Pure transition function of the per-category state machine.
pub fn advance(streak: &Streak, today: NaiveDate) -> (Streak, StreakTransition) {
    let yesterday = today - Duration::days(1);

    match streak.last_date {
        Some(last) if last == today => (streak.clone(), StreakTransition::AlreadyCounted),
        _ if streak.count == 0 => (
            Streak {
                count: 1,
                last_date: Some(today),
                start_date: Some(today),
            },
            StreakTransition::Started,
        ),
        Some(last) if last == yesterday => (
            Streak {
                count: streak.count + 1,
                last_date: Some(today),
                start_date: streak.start_date.or(Some(today)),
            },
            StreakTransition::Continued,
        ),
        // Two or more days without activity: drop the old chain and start a
        // fresh one-day streak today.
        _ => (
            Streak {
                count: 1,
                last_date: Some(today),
                start_date: Some(today),
            },
            StreakTransition::Reset,
        ),
    }
}

/// Maintains the per-category contiguous-day counters on the user's
/// aggregate document. The read-modify-write is unguarded; two devices
/// racing can lose an update (accepted limitation).
pub struct StreakService {
    session: Arc<SessionManager>,
    store: Arc<dyn DocumentStore>,
    db: DbPool,
}

impl StreakService {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn DocumentStore>, db: DbPool) -> Self {
        Self { session, store, db }
    }

    pub async fn record_activity(
        &self,
        category: RecordCategory,
        today: NaiveDate,
    ) -> AppResult<Streak> {
        let uid = self.session.current_uid()?;
        let mut streaks = self.load_remote(&uid).await?;

        let current = streaks.get(&category).cloned().unwrap_or_default();
        let (next, transition) = advance(&current, today);

        info!(
            target: "app::streak",
            category = %category,
            count = next.count,
            transition = ?transition,
            "streak evaluated"
        );

        if transition != StreakTransition::AlreadyCounted {
            streaks.insert(category, next.clone());
            self.persist(&uid, &streaks).await?;
        }

        Ok(next)
    }

    /// Current streak map; serves the offline mirror when the remote store
    /// is unreachable.
    pub async fn streaks(&self) -> AppResult<StreakMap> {
        let uid = self.session.current_uid()?;

        match self.load_remote(&uid).await {
            Ok(streaks) => Ok(streaks),
            Err(error) if error.is_unavailable() => {
                warn!(
                    target: "app::streak",
                    error = %error,
                    "remote streaks unavailable, serving offline mirror"
                );
                Ok(self.read_mirror(&uid).await)
            }
            Err(error) => Err(error),
        }
    }

    async fn load_remote(&self, uid: &str) -> AppResult<StreakMap> {
        let root = self.store.read_root(uid).await?;
        let Some(root) = root else {
            return Ok(StreakMap::new());
        };

        match root.get(ROOT_FIELD) {
            Some(value) => Ok(serde_json::from_value(value.clone()).unwrap_or_else(|error| {
                warn!(target: "app::streak", error = %error, "streak map corrupt, starting over");
                StreakMap::new()
            })),
            None => Ok(StreakMap::new()),
        }
    }

    async fn persist(&self, uid: &str, streaks: &StreakMap) -> AppResult<()> {
        let mut patch = JsonMap::new();
        patch.insert(ROOT_FIELD.to_string(), serde_json::to_value(streaks)?);
        self.store.merge_root(uid, patch).await?;

        self.write_mirror(uid, streaks).await;
        Ok(())
    }

    async fn write_mirror(&self, uid: &str, streaks: &StreakMap) {
        let payload = match serde_json::to_string(streaks) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(target: "app::streak", error = %error, "failed to serialize streak mirror");
                return;
            }
        };

        let db = self.db.clone();
        let owner = uid.to_string();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::put(conn, &owner, namespaces::STREAKS, MIRROR_KEY, &payload)
            })
        })
        .await;

        if let Ok(Err(error)) = result {
            warn!(target: "app::streak", error = %error, "streak mirror write failed");
        }
    }

    async fn read_mirror(&self, uid: &str) -> StreakMap {
        let db = self.db.clone();
        let owner = uid.to_string();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::get(conn, &owner, namespaces::STREAKS, MIRROR_KEY)
            })
        })
        .await;

        match result {
            Ok(Ok(Some(payload))) => serde_json::from_str(&payload).unwrap_or_default(),
            _ => StreakMap::new(),
        }
    }
}
