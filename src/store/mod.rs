use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::AppResult;
use crate::models::record::{Record, RecordCategory};

pub mod memory;
pub mod rest;

/// Upper bound applied to every list read so a large history cannot blow up
/// client memory.
pub const DEFAULT_FETCH_LIMIT: usize = 100;

/// Tenant-scoped collection address: `users/{uid}/{collection}`. This scheme
/// is the one store contract preserved bit-for-bit across backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub uid: String,
    pub category: RecordCategory,
}

impl CollectionPath {
    pub fn new(uid: impl Into<String>, category: RecordCategory) -> Self {
        Self {
            uid: uid.into(),
            category,
        }
    }

    pub fn relative(&self) -> String {
        format!("users/{}/{}", self.uid, self.category.as_str())
    }
}

/// Document as the store hands it back: server-assigned id and timestamps
/// plus the flat payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: JsonMap<String, JsonValue>,
}

impl StoredDocument {
    pub fn into_record(self, uid: &str, category: RecordCategory) -> Record {
        Record {
            id: self.id,
            user_id: uid.to_string(),
            category,
            created_at: self.created_at,
            updated_at: self.updated_at,
            fields: self.fields,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: usize,
    /// Optional equality filter on one payload field, e.g.
    /// `("activityType", "running")`.
    pub field_equals: Option<(String, String)>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_FETCH_LIMIT,
            field_equals: None,
        }
    }
}

impl ListQuery {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            field_equals: None,
        }
    }

    pub fn field_equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field_equals = Some((field.into(), value.into()));
        self
    }
}

/// Remote document database seam. All calls are async, non-blocking network
/// operations; implementations map transport failures onto the recoverable
/// `Unavailable` condition.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append-only write; the store assigns id and both timestamps.
    async fn insert(
        &self,
        path: &CollectionPath,
        fields: JsonMap<String, JsonValue>,
    ) -> AppResult<StoredDocument>;

    /// Newest-first window over one collection.
    async fn list(&self, path: &CollectionPath, query: &ListQuery)
        -> AppResult<Vec<StoredDocument>>;

    /// Merge-patch a document. Returns `Ok(false)` when the id is unknown.
    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: JsonMap<String, JsonValue>,
    ) -> AppResult<bool>;

    /// Returns `Ok(false)` when the id is unknown.
    async fn delete(&self, path: &CollectionPath, id: &str) -> AppResult<bool>;

    /// The per-user root document (`users/{uid}`) carrying `goals`,
    /// `streaks` and `statistics`. `None` when it does not exist yet.
    async fn read_root(&self, uid: &str) -> AppResult<Option<JsonMap<String, JsonValue>>>;

    /// Merge-patch the root document, creating it if missing.
    async fn merge_root(&self, uid: &str, patch: JsonMap<String, JsonValue>) -> AppResult<()>;

    /// All-or-nothing batched delete of every record collection plus the
    /// root document.
    async fn delete_user_tree(&self, uid: &str) -> AppResult<()>;
}
