use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};

use crate::db::repositories::cache_repository::{namespaces, CacheRepository};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::record::{
    to_field_map, ActivitySessionInput, JournalEntryInput, MoodEntryInput, Record, RecordCategory,
    SleepSessionInput,
};
use crate::services::session_service::SessionManager;
use crate::store::{CollectionPath, DocumentStore, ListQuery, DEFAULT_FETCH_LIMIT};

/// Single write path for per-user records. Every operation resolves the
/// owning uid from the session first; successful remote writes are mirrored
/// to the offline cache, and list reads fall back to that mirror when the
/// remote store is unreachable.
pub struct RecordService {
    session: Arc<SessionManager>,
    store: Arc<dyn DocumentStore>,
    db: DbPool,
}

impl RecordService {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn DocumentStore>, db: DbPool) -> Self {
        Self { session, store, db }
    }

    pub async fn add(
        &self,
        category: RecordCategory,
        fields: JsonMap<String, JsonValue>,
    ) -> AppResult<Record> {
        let uid = self.session.current_uid()?;
        let path = CollectionPath::new(&uid, category);
        let document = self.store.insert(&path, fields).await?;
        let record = document.into_record(&uid, category);

        debug!(
            target: "app::records",
            category = %category,
            id = %record.id,
            "record added"
        );

        self.prepend_to_mirror(&uid, category, record.clone()).await;
        Ok(record)
    }

    pub async fn add_sleep_session(&self, input: SleepSessionInput) -> AppResult<Record> {
        self.add(RecordCategory::SleepSessions, to_field_map(&input)?)
            .await
    }

    pub async fn add_journal_entry(&self, input: JournalEntryInput) -> AppResult<Record> {
        self.add(RecordCategory::JournalEntries, to_field_map(&input)?)
            .await
    }

    pub async fn add_mood_entry(&self, input: MoodEntryInput) -> AppResult<Record> {
        self.add(RecordCategory::MoodEntries, to_field_map(&input)?)
            .await
    }

    pub async fn add_activity_session(&self, input: ActivitySessionInput) -> AppResult<Record> {
        self.add(RecordCategory::ActivitySessions, to_field_map(&input)?)
            .await
    }

    /// Newest-first window. On `Unavailable` the last mirrored window is
    /// served instead, with the filter and limit applied locally.
    pub async fn list(&self, category: RecordCategory, query: ListQuery) -> AppResult<Vec<Record>> {
        let uid = self.session.current_uid()?;
        let path = CollectionPath::new(&uid, category);

        match self.store.list(&path, &query).await {
            Ok(documents) => {
                let records: Vec<Record> = documents
                    .into_iter()
                    .map(|document| document.into_record(&uid, category))
                    .collect();

                // Only unfiltered windows refresh the mirror; a filtered
                // slice would shadow records the fallback still needs.
                if query.field_equals.is_none() {
                    self.write_mirror(&uid, category, &records).await;
                }

                Ok(records)
            }
            Err(error) if error.is_unavailable() => {
                warn!(
                    target: "app::records",
                    category = %category,
                    error = %error,
                    "remote list failed, serving offline mirror"
                );

                let mut records = self.read_mirror(&uid, category).await;
                if let Some((field, value)) = &query.field_equals {
                    records.retain(|record| {
                        record.text_field(field).map(|actual| actual == value) == Some(true)
                    });
                }
                records.truncate(query.limit);
                Ok(records)
            }
            Err(error) => Err(error),
        }
    }

    /// Merge-patch one record. `Ok(false)` when the id is unknown.
    pub async fn update(
        &self,
        category: RecordCategory,
        id: &str,
        patch: JsonMap<String, JsonValue>,
    ) -> AppResult<bool> {
        let uid = self.session.current_uid()?;
        let path = CollectionPath::new(&uid, category);

        let updated = self.store.update(&path, id, patch.clone()).await?;
        if updated {
            self.patch_mirror(&uid, category, id, patch).await;
        }
        Ok(updated)
    }

    /// `Ok(false)` when the id is unknown.
    pub async fn delete(&self, category: RecordCategory, id: &str) -> AppResult<bool> {
        let uid = self.session.current_uid()?;
        let path = CollectionPath::new(&uid, category);

        let deleted = self.store.delete(&path, id).await?;
        if deleted {
            self.remove_from_mirror(&uid, category, id).await;
        }
        Ok(deleted)
    }

    /// Account erasure / debug reset: every record collection plus the
    /// aggregate document, then the whole offline mirror for this owner.
    pub async fn clear_all(&self) -> AppResult<()> {
        let uid = self.session.current_uid()?;
        self.store.delete_user_tree(&uid).await?;

        let db = self.db.clone();
        let owner = uid.clone();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| CacheRepository::clear_owner(conn, &owner))
        })
        .await;

        match result {
            Ok(Ok(removed)) => {
                debug!(target: "app::records", uid = %uid, removed, "offline mirror cleared");
            }
            Ok(Err(error)) => {
                warn!(target: "app::records", uid = %uid, error = %error, "failed to clear offline mirror");
            }
            Err(error) => {
                warn!(target: "app::records", uid = %uid, error = %error, "mirror clear task panicked");
            }
        }

        Ok(())
    }

    /// Records of one category created on the given calendar day, for goal
    /// progress and streak evaluation.
    pub async fn todays_records(
        &self,
        category: RecordCategory,
        today: NaiveDate,
    ) -> AppResult<Vec<Record>> {
        let mut records = self.list(category, ListQuery::default()).await?;
        records.retain(|record| record.created_at.date_naive() == today);
        Ok(records)
    }

    async fn write_mirror(&self, uid: &str, category: RecordCategory, records: &[Record]) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(target: "app::records", error = %error, "failed to serialize mirror window");
                return;
            }
        };

        let db = self.db.clone();
        let owner = uid.to_string();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::put(
                    conn,
                    &owner,
                    namespaces::RECORDS,
                    category.as_str(),
                    &payload,
                )
            })
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(target: "app::records", category = %category, error = %error, "mirror write failed");
            }
            Err(error) => {
                warn!(target: "app::records", category = %category, error = %error, "mirror write task panicked");
            }
        }
    }

    async fn read_mirror(&self, uid: &str, category: RecordCategory) -> Vec<Record> {
        let db = self.db.clone();
        let owner = uid.to_string();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::get(conn, &owner, namespaces::RECORDS, category.as_str())
            })
        })
        .await;

        let payload = match result {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => return Vec::new(),
            Ok(Err(error)) => {
                warn!(target: "app::records", category = %category, error = %error, "mirror read failed");
                return Vec::new();
            }
            Err(error) => {
                warn!(target: "app::records", category = %category, error = %error, "mirror read task panicked");
                return Vec::new();
            }
        };

        serde_json::from_str(&payload).unwrap_or_else(|error| {
            warn!(target: "app::records", category = %category, error = %error, "mirror payload corrupt");
            Vec::new()
        })
    }

    async fn prepend_to_mirror(&self, uid: &str, category: RecordCategory, record: Record) {
        let mut records = self.read_mirror(uid, category).await;
        records.insert(0, record);
        records.truncate(DEFAULT_FETCH_LIMIT);
        self.write_mirror(uid, category, &records).await;
    }

    async fn patch_mirror(
        &self,
        uid: &str,
        category: RecordCategory,
        id: &str,
        patch: JsonMap<String, JsonValue>,
    ) {
        let mut records = self.read_mirror(uid, category).await;
        if let Some(record) = records.iter_mut().find(|record| record.id == id) {
            for (key, value) in patch {
                record.fields.insert(key, value);
            }
            record.updated_at = Utc::now();
        }
        self.write_mirror(uid, category, &records).await;
    }

    async fn remove_from_mirror(&self, uid: &str, category: RecordCategory, id: &str) {
        let mut records = self.read_mirror(uid, category).await;
        records.retain(|record| record.id != id);
        self.write_mirror(uid, category, &records).await;
    }
}
