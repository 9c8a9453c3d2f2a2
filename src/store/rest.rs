use std::time::Duration as StdDuration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{CollectionPath, DocumentStore, ListQuery, StoredDocument};

const DEFAULT_HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub http_timeout: StdDuration,
    pub connect_timeout: StdDuration,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<StoredDocument>,
}

/// Document database client. Collections live under
/// `{base}/users/{uid}/{collection}`; the per-user root document is
/// `{base}/users/{uid}`. No retries on the data path: transient failures
/// surface as `Unavailable` and callers fall back to the offline mirror.
pub struct RestDocumentStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestDocumentStore {
    pub fn new(config: RestStoreConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("初始化文档存储 HTTP 客户端失败: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn collection_url(&self, path: &CollectionPath) -> String {
        format!("{}/{}", self.base_url, path.relative())
    }

    fn document_url(&self, path: &CollectionPath, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, path.relative(), id)
    }

    fn root_url(&self, uid: &str) -> String {
        format!("{}/users/{}", self.base_url, uid)
    }

    fn map_status(status: StatusCode, correlation_id: &str) -> AppError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(
                    target: "app::store::rest",
                    correlation_id = %correlation_id,
                    status = status.as_u16(),
                    "store rejected credentials"
                );
                AppError::Unauthenticated
            }
            StatusCode::NOT_FOUND => AppError::NotFound,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                AppError::unavailable(format!("文档存储忙 (状态码 {})", status.as_u16()))
            }
            status if status.is_server_error() => {
                AppError::unavailable(format!("文档存储暂时不可用 (状态码 {})", status.as_u16()))
            }
            status => AppError::other(format!("文档存储返回异常状态码 {}", status.as_u16())),
        }
    }

    async fn expect_success(
        response: reqwest::Response,
        correlation_id: &str,
    ) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Self::map_status(status, correlation_id))
        }
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn insert(
        &self,
        path: &CollectionPath,
        fields: JsonMap<String, JsonValue>,
    ) -> AppResult<StoredDocument> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            target: "app::store::rest",
            collection = %path.relative(),
            correlation_id = %correlation_id,
            "inserting document"
        );

        let response = self
            .client
            .post(self.collection_url(path))
            .bearer_auth(&self.api_key)
            .json(&JsonValue::Object(fields))
            .send()
            .await?;

        let response = Self::expect_success(response, &correlation_id).await?;
        let document: StoredDocument = response.json().await?;
        Ok(document)
    }

    async fn list(
        &self,
        path: &CollectionPath,
        query: &ListQuery,
    ) -> AppResult<Vec<StoredDocument>> {
        let correlation_id = Uuid::new_v4().to_string();
        let mut request = self
            .client
            .get(self.collection_url(path))
            .bearer_auth(&self.api_key)
            .query(&[("limit", query.limit.to_string())]);

        if let Some((field, value)) = &query.field_equals {
            request = request.query(&[("field", field.as_str()), ("equals", value.as_str())]);
        }

        let response = request.send().await?;
        let response = Self::expect_success(response, &correlation_id).await?;
        let body: ListResponse = response.json().await?;

        // The server already orders newest-first; re-sort so the contract
        // holds even against a lagging replica.
        let mut documents = body.documents;
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.truncate(query.limit);

        debug!(
            target: "app::store::rest",
            collection = %path.relative(),
            correlation_id = %correlation_id,
            count = documents.len(),
            "listed documents"
        );

        Ok(documents)
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        patch: JsonMap<String, JsonValue>,
    ) -> AppResult<bool> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = self
            .client
            .patch(self.document_url(path, id))
            .bearer_auth(&self.api_key)
            .json(&JsonValue::Object(patch))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        Self::expect_success(response, &correlation_id).await?;
        Ok(true)
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> AppResult<bool> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = self
            .client
            .delete(self.document_url(path, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        Self::expect_success(response, &correlation_id).await?;
        Ok(true)
    }

    async fn read_root(&self, uid: &str) -> AppResult<Option<JsonMap<String, JsonValue>>> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = self
            .client
            .get(self.root_url(uid))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::expect_success(response, &correlation_id).await?;
        let body: JsonValue = response.json().await?;
        match body {
            JsonValue::Object(map) => Ok(Some(map)),
            other => {
                warn!(
                    target: "app::store::rest",
                    correlation_id = %correlation_id,
                    body = %other,
                    "root document is not an object"
                );
                Ok(None)
            }
        }
    }

    async fn merge_root(&self, uid: &str, patch: JsonMap<String, JsonValue>) -> AppResult<()> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = self
            .client
            .patch(self.root_url(uid))
            .bearer_auth(&self.api_key)
            .json(&JsonValue::Object(patch))
            .send()
            .await?;

        Self::expect_success(response, &correlation_id).await?;
        Ok(())
    }

    async fn delete_user_tree(&self, uid: &str) -> AppResult<()> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            target: "app::store::rest",
            uid = %uid,
            correlation_id = %correlation_id,
            "deleting user tree"
        );

        // Single server-side batched delete: the root document and every
        // sub-collection go together or not at all.
        let response = self
            .client
            .delete(self.root_url(uid))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Self::expect_success(response, &correlation_id).await?;
        Ok(())
    }
}
