use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};

/// Mirror namespaces. Record lists are keyed by category collection name
/// inside the `records` namespace; the other namespaces hold one blob each.
pub mod namespaces {
    pub const RECORDS: &str = "records";
    pub const STREAKS: &str = "streaks";
    pub const GOALS: &str = "goals";
    pub const PROFILE: &str = "profile";
}

#[derive(Debug, Clone)]
pub struct CacheEntryRow {
    pub owner_uid: String,
    pub namespace: String,
    pub cache_key: String,
    pub payload: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for CacheEntryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            owner_uid: row.get("owner_uid")?,
            namespace: row.get("namespace")?,
            cache_key: row.get("cache_key")?,
            payload: row.get("payload")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct CacheRepository;

impl CacheRepository {
    pub fn put(
        conn: &Connection,
        owner_uid: &str,
        namespace: &str,
        cache_key: &str,
        payload: &str,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO offline_cache (
                    owner_uid,
                    namespace,
                    cache_key,
                    payload,
                    updated_at
                ) VALUES (
                    :owner_uid,
                    :namespace,
                    :cache_key,
                    :payload,
                    :updated_at
                )
                ON CONFLICT(owner_uid, namespace, cache_key) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":owner_uid": owner_uid,
                ":namespace": namespace,
                ":cache_key": cache_key,
                ":payload": payload,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;

        Ok(())
    }

    pub fn get(
        conn: &Connection,
        owner_uid: &str,
        namespace: &str,
        cache_key: &str,
    ) -> AppResult<Option<String>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT payload
                FROM offline_cache
                WHERE owner_uid = :owner_uid
                  AND namespace = :namespace
                  AND cache_key = :cache_key
            "#,
        )?;

        let payload = stmt
            .query_row(
                named_params! {
                    ":owner_uid": owner_uid,
                    ":namespace": namespace,
                    ":cache_key": cache_key,
                },
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(payload)
    }

    pub fn find_entry(
        conn: &Connection,
        owner_uid: &str,
        namespace: &str,
        cache_key: &str,
    ) -> AppResult<CacheEntryRow> {
        let mut stmt = conn.prepare(
            r#"
                SELECT owner_uid, namespace, cache_key, payload, updated_at
                FROM offline_cache
                WHERE owner_uid = :owner_uid
                  AND namespace = :namespace
                  AND cache_key = :cache_key
            "#,
        )?;

        let row = stmt
            .query_row(
                named_params! {
                    ":owner_uid": owner_uid,
                    ":namespace": namespace,
                    ":cache_key": cache_key,
                },
                |row| CacheEntryRow::try_from(row),
            )
            .optional()?;

        match row {
            Some(row) => Ok(row),
            None => Err(AppError::not_found()),
        }
    }

    pub fn delete(
        conn: &Connection,
        owner_uid: &str,
        namespace: &str,
        cache_key: &str,
    ) -> AppResult<bool> {
        let affected = conn.execute(
            r#"
                DELETE FROM offline_cache
                WHERE owner_uid = :owner_uid
                  AND namespace = :namespace
                  AND cache_key = :cache_key
            "#,
            named_params! {
                ":owner_uid": owner_uid,
                ":namespace": namespace,
                ":cache_key": cache_key,
            },
        )?;

        Ok(affected > 0)
    }

    pub fn clear_namespace(
        conn: &Connection,
        owner_uid: &str,
        namespace: &str,
    ) -> AppResult<usize> {
        let affected = conn.execute(
            "DELETE FROM offline_cache WHERE owner_uid = :owner_uid AND namespace = :namespace",
            named_params! {
                ":owner_uid": owner_uid,
                ":namespace": namespace,
            },
        )?;

        Ok(affected)
    }

    pub fn clear_owner(conn: &Connection, owner_uid: &str) -> AppResult<usize> {
        let affected = conn.execute(
            "DELETE FROM offline_cache WHERE owner_uid = :owner_uid",
            named_params! {":owner_uid": owner_uid},
        )?;

        Ok(affected)
    }
}
