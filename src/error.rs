use std::fmt;

use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    InvalidCredentials,
    EmailAlreadyTaken,
    HttpTimeout,
    RateLimited,
    InvalidResponse,
    ProviderUnavailable,
    Unknown,
}

impl AuthErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthErrorCode::EmailAlreadyTaken => "EMAIL_ALREADY_TAKEN",
            AuthErrorCode::HttpTimeout => "HTTP_TIMEOUT",
            AuthErrorCode::RateLimited => "RATE_LIMITED",
            AuthErrorCode::InvalidResponse => "INVALID_RESPONSE",
            AuthErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            AuthErrorCode::Unknown => "UNKNOWN_AUTH_ERROR",
        }
    }

    /// Only transient provider conditions may be retried; credential and
    /// response-shape failures surface immediately.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            AuthErrorCode::HttpTimeout
                | AuthErrorCode::RateLimited
                | AuthErrorCode::ProviderUnavailable
        )
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("未登录或会话已失效")]
    Unauthenticated,

    #[error("远端存储暂时不可用: {message}")]
    Unavailable { message: String },

    #[error("数据库错误: {message}")]
    Database { message: String },

    #[error("记录未找到")]
    NotFound,

    #[error("验证失败: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<JsonValue>,
    },

    #[error("{message}")]
    Auth {
        code: AuthErrorCode,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn unauthenticated() -> Self {
        warn!(target: "app::auth", "operation requires a signed-in user");
        AppError::Unauthenticated
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::store", %message, "remote store unavailable");
        AppError::Unavailable { message }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            source: None,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            source: None,
            details: Some(details),
        }
    }

    pub fn auth(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self::auth_with_correlation(code, message, None)
    }

    pub fn auth_with_correlation(
        code: AuthErrorCode,
        message: impl Into<String>,
        correlation_id: Option<&str>,
    ) -> Self {
        let message = message.into();
        let correlation = correlation_id.map(|value| value.to_string());
        match &correlation {
            Some(id) => {
                warn!(target: "app::auth", code = %code, correlation_id = %id, %message);
            }
            None => {
                warn!(target: "app::auth", code = %code, %message);
            }
        }

        AppError::Auth {
            code,
            message,
            correlation_id: correlation,
        }
    }

    pub fn auth_code(&self) -> Option<AuthErrorCode> {
        match self {
            AppError::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::db", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::db", %message, "database error");
        AppError::Database { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    /// Recoverable conditions: callers may fall back to the offline mirror.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AppError::Unavailable { .. })
    }

    /// Whether the auth retry loop may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Unavailable { .. } => true,
            AppError::Auth { code, .. } => code.is_retryable(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::QueryReturnedNoRows;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            _ => {
                error!(target: "app::db", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AppError::unavailable(format!("请求超时: {error}"))
        } else if error.is_connect() {
            AppError::unavailable(format!("连接失败: {error}"))
        } else if error.is_decode() {
            error!(target: "app::store", error = %error, "failed to decode remote response");
            AppError::Other(format!("解析远端响应失败: {error}"))
        } else {
            AppError::unavailable(error.to_string())
        }
    }
}
