use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::record::RecordCategory;
use crate::store::{CollectionPath, DocumentStore, ListQuery, StoredDocument};

#[derive(Default)]
struct MemoryState {
    collections: HashMap<(String, RecordCategory), Vec<StoredDocument>>,
    roots: HashMap<String, JsonMap<String, JsonValue>>,
}

/// In-process store twin used by tests and offline development. Ids and
/// timestamps are assigned locally; `delete_user_tree` is all-or-nothing
/// under one write lock.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: RwLock<MemoryState>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every operation fails with the recoverable
    /// `Unavailable` condition, mimicking a dropped connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(AppError::unavailable("内存存储处于离线模式"))
        } else {
            Ok(())
        }
    }

    fn matches_filter(document: &StoredDocument, filter: &Option<(String, String)>) -> bool {
        match filter {
            Some((field, value)) => document
                .fields
                .get(field)
                .and_then(JsonValue::as_str)
                .map(|actual| actual == value)
                .unwrap_or(false),
            None => true,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        path: &CollectionPath,
        fields: JsonMap<String, JsonValue>,
    ) -> AppResult<StoredDocument> {
        self.ensure_online()?;
        let now = Utc::now();
        let document = StoredDocument {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            fields,
        };

        let mut state = self
            .state
            .write()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;
        state
            .collections
            .entry((path.uid.clone(), path.category))
            .or_default()
            .push(document.clone());

        debug!(
            target: "app::store::memory",
            collection = %path.relative(),
            id = %document.id,
            "inserted document"
        );

        Ok(document)
    }

    async fn list(
        &self,
        path: &CollectionPath,
        query: &ListQuery,
    ) -> AppResult<Vec<StoredDocument>> {
        self.ensure_online()?;
        let state = self
            .state
            .read()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;

        let mut documents: Vec<StoredDocument> = state
            .collections
            .get(&(path.uid.clone(), path.category))
            .map(|docs| {
                docs.iter()
                    .filter(|doc| Self::matches_filter(doc, &query.field_equals))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.truncate(query.limit);
        Ok(documents)
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: JsonMap<String, JsonValue>,
    ) -> AppResult<bool> {
        self.ensure_online()?;
        let mut state = self
            .state
            .write()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;

        let Some(documents) = state.collections.get_mut(&(path.uid.clone(), path.category))
        else {
            return Ok(false);
        };

        match documents.iter_mut().find(|doc| doc.id == id) {
            Some(document) => {
                for (key, value) in patch {
                    document.fields.insert(key, value);
                }
                document.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> AppResult<bool> {
        self.ensure_online()?;
        let mut state = self
            .state
            .write()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;

        let Some(documents) = state.collections.get_mut(&(path.uid.clone(), path.category))
        else {
            return Ok(false);
        };

        let before = documents.len();
        documents.retain(|doc| doc.id != id);
        Ok(documents.len() < before)
    }

    async fn read_root(&self, uid: &str) -> AppResult<Option<JsonMap<String, JsonValue>>> {
        self.ensure_online()?;
        let state = self
            .state
            .read()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;
        Ok(state.roots.get(uid).cloned())
    }

    async fn merge_root(&self, uid: &str, patch: JsonMap<String, JsonValue>) -> AppResult<()> {
        self.ensure_online()?;
        let mut state = self
            .state
            .write()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;

        let root = state.roots.entry(uid.to_string()).or_default();
        for (key, value) in patch {
            root.insert(key, value);
        }
        Ok(())
    }

    async fn delete_user_tree(&self, uid: &str) -> AppResult<()> {
        self.ensure_online()?;
        let mut state = self
            .state
            .write()
            .map_err(|_| AppError::other("内存存储锁已损坏"))?;

        state.collections.retain(|(owner, _), _| owner != uid);
        state.roots.remove(uid);

        debug!(target: "app::store::memory", uid = %uid, "deleted user tree");
        Ok(())
    }
}
