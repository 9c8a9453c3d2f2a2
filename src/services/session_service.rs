use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::repositories::cache_repository::{namespaces, CacheRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult, AuthErrorCode};
use crate::models::user::UserProfile;

/// Auth attempts use a fixed doubling schedule: three tries, one and two
/// seconds between them. Data-path operations are never retried.
const AUTH_BACKOFF_SCHEDULE: [StdDuration; 3] = [
    StdDuration::from_secs(0),
    StdDuration::from_secs(1),
    StdDuration::from_secs(2),
];

/// Owner key for the session-local profile mirror; the signed-in blob is the
/// session itself, not per-account data.
const SESSION_OWNER: &str = "__session__";
const PROFILE_KEY: &str = "current";

/// Federated auth provider seam. The core consumes exactly two capabilities:
/// resolve the current user id, and react to identity changes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<UserProfile>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AppResult<UserProfile>;

    async fn sign_out(&self, uid: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct RestIdentityConfig {
    pub base_url: String,
    pub api_key: String,
    pub http_timeout: StdDuration,
}

impl RestIdentityConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http_timeout: StdDuration::from_secs(10),
        }
    }
}

pub struct RestIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestIdentityProvider {
    pub fn new(config: RestIdentityConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|err| AppError::other(format!("初始化认证 HTTP 客户端失败: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn map_status(status: StatusCode, correlation_id: &str) -> AppError {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::auth_with_correlation(
                    AuthErrorCode::InvalidCredentials,
                    "邮箱或密码错误",
                    Some(correlation_id),
                )
            }
            StatusCode::CONFLICT => AppError::auth_with_correlation(
                AuthErrorCode::EmailAlreadyTaken,
                "该邮箱已注册",
                Some(correlation_id),
            ),
            StatusCode::TOO_MANY_REQUESTS => AppError::auth_with_correlation(
                AuthErrorCode::RateLimited,
                "认证请求过于频繁，请稍后重试",
                Some(correlation_id),
            ),
            status if status.is_server_error() => AppError::auth_with_correlation(
                AuthErrorCode::ProviderUnavailable,
                format!("认证服务暂时不可用 (状态码 {})", status.as_u16()),
                Some(correlation_id),
            ),
            status => AppError::auth_with_correlation(
                AuthErrorCode::Unknown,
                format!("认证服务返回异常状态码 {}", status.as_u16()),
                Some(correlation_id),
            ),
        }
    }

    fn map_transport(err: reqwest::Error, correlation_id: &str) -> AppError {
        if err.is_timeout() {
            AppError::auth_with_correlation(
                AuthErrorCode::HttpTimeout,
                "认证请求超时",
                Some(correlation_id),
            )
        } else if err.is_connect() {
            AppError::auth_with_correlation(
                AuthErrorCode::ProviderUnavailable,
                "认证服务网络连接失败",
                Some(correlation_id),
            )
        } else {
            AppError::auth_with_correlation(
                AuthErrorCode::Unknown,
                format!("认证请求失败: {err}"),
                Some(correlation_id),
            )
        }
    }

    async fn expect_profile(
        response: Result<reqwest::Response, reqwest::Error>,
        correlation_id: &str,
    ) -> AppResult<UserProfile> {
        let response = response.map_err(|err| Self::map_transport(err, correlation_id))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status, correlation_id));
        }

        response.json::<UserProfile>().await.map_err(|err| {
            AppError::auth_with_correlation(
                AuthErrorCode::InvalidResponse,
                format!("解析认证响应失败: {err}"),
                Some(correlation_id),
            )
        })
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<UserProfile> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(target: "app::auth", correlation_id = %correlation_id, "signing in");

        let response = self
            .client
            .post(format!("{}/v1/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await;

        Self::expect_profile(response, &correlation_id).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AppResult<UserProfile> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(target: "app::auth", correlation_id = %correlation_id, "signing up");

        let response = self
            .client
            .post(format!("{}/v1/accounts", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "displayName": display_name,
            }))
            .send()
            .await;

        Self::expect_profile(response, &correlation_id).await
    }

    async fn sign_out(&self, uid: &str) -> AppResult<()> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = self
            .client
            .delete(format!("{}/v1/sessions/current", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("uid", uid)])
            .send()
            .await
            .map_err(|err| Self::map_transport(err, &correlation_id))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::map_status(status, &correlation_id))
        }
    }
}

pub type IdentityObserver = Box<dyn Fn(Option<&UserProfile>) + Send + Sync>;

/// Owns the provider seam, applies the auth retry policy, mirrors the
/// signed-in profile blob to the offline cache and fans identity changes out
/// to registered observers. All per-user data access resolves its uid here.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    db: DbPool,
    current: RwLock<Option<UserProfile>>,
    observers: RwLock<Vec<IdentityObserver>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, db: DbPool) -> Self {
        Self {
            provider,
            db,
            current: RwLock::new(None),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<UserProfile> {
        let profile = self
            .retrying("sign_in", || self.provider.sign_in(email, password))
            .await?;

        info!(target: "app::auth", uid = %profile.uid, "signed in");
        self.persist_profile(&profile).await;
        self.set_current(Some(profile.clone()));
        Ok(profile)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AppResult<UserProfile> {
        let profile = self
            .retrying("sign_up", || {
                self.provider.sign_up(email, password, display_name)
            })
            .await?;

        info!(target: "app::auth", uid = %profile.uid, "account created");
        self.persist_profile(&profile).await;
        self.set_current(Some(profile.clone()));
        Ok(profile)
    }

    /// Clears the local session even when remote revocation fails; the
    /// device must not stay signed in because the network dropped.
    pub async fn sign_out(&self) -> AppResult<()> {
        let uid = self.current_uid()?;

        if let Err(error) = self.provider.sign_out(&uid).await {
            warn!(target: "app::auth", uid = %uid, error = %error, "remote sign-out failed");
        }

        self.clear_profile_mirror().await;
        self.set_current(None);
        info!(target: "app::auth", uid = %uid, "signed out");
        Ok(())
    }

    /// Re-hydrate the session from the mirrored profile blob, for app starts
    /// without connectivity.
    pub fn restore_from_cache(&self) -> AppResult<Option<UserProfile>> {
        let payload = self.db.with_connection(|conn| {
            CacheRepository::get(conn, SESSION_OWNER, namespaces::PROFILE, PROFILE_KEY)
        })?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let profile: UserProfile = serde_json::from_str(&payload)?;
        info!(target: "app::auth", uid = %profile.uid, "session restored from cache");
        self.set_current(Some(profile.clone()));
        Ok(Some(profile))
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    pub fn current_uid(&self) -> AppResult<String> {
        self.current_user()
            .map(|profile| profile.uid)
            .ok_or_else(AppError::unauthenticated)
    }

    pub fn on_identity_change(&self, observer: IdentityObserver) {
        if let Ok(mut guard) = self.observers.write() {
            guard.push(observer);
        }
    }

    fn set_current(&self, user: Option<UserProfile>) {
        if let Ok(mut guard) = self.current.write() {
            *guard = user.clone();
        }
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer(user.as_ref());
            }
        }
    }

    async fn persist_profile(&self, profile: &UserProfile) {
        let db = self.db.clone();
        let payload = match serde_json::to_string(profile) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(target: "app::auth", error = %error, "failed to serialize profile blob");
                return;
            }
        };

        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::put(
                    conn,
                    SESSION_OWNER,
                    namespaces::PROFILE,
                    PROFILE_KEY,
                    &payload,
                )
            })
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(target: "app::auth", error = %error, "failed to mirror profile blob");
            }
            Err(error) => {
                warn!(target: "app::auth", error = %error, "profile mirror task panicked");
            }
        }
    }

    async fn clear_profile_mirror(&self) {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || {
            db.with_connection(|conn| {
                CacheRepository::delete(conn, SESSION_OWNER, namespaces::PROFILE, PROFILE_KEY)
            })
        })
        .await;

        if let Ok(Err(error)) = result {
            warn!(target: "app::auth", error = %error, "failed to clear profile mirror");
        }
    }

    async fn retrying<T, F, Fut>(&self, operation: &str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay) in AUTH_BACKOFF_SCHEDULE.iter().enumerate() {
            if *delay > StdDuration::from_secs(0) {
                sleep(*delay).await;
            }

            debug!(
                target: "app::auth",
                operation,
                attempt = attempt + 1,
                "attempting auth operation"
            );

            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let retryable = error.is_retryable();
                    warn!(
                        target: "app::auth",
                        operation,
                        attempt = attempt + 1,
                        retryable,
                        error = %error,
                        "auth attempt failed"
                    );

                    if !retryable || attempt == AUTH_BACKOFF_SCHEDULE.len() - 1 {
                        return Err(error);
                    }

                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::auth(AuthErrorCode::Unknown, "认证请求失败")))
    }
}
