use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

/// Classification and reporting shared by every error of the workspace.
pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("[{}] {}", self.error_code(), self);
        match self {
            CoreError::RedditApi(e) => error!("Reddit API error details: {:?}", e),
            CoreError::Database(e) => error!("Cache store error details: {:?}", e),
            CoreError::Config(e) => error!("Configuration error details: {:?}", e),
            CoreError::Network(e) => error!("Network error details: {:?}", e),
            CoreError::Internal { .. } => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("[{}] {}", self.error_code(), self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::Config(_) | CoreError::Internal { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            CoreError::Database(e) => e.retry_after(),
            CoreError::Network(_) if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Could not reach Reddit. Please check your internet connection.".to_string()
            }
            CoreError::Internal { message } => format!("Unexpected failure: {}", message),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::Database(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("[{}] {}", self.error_code(), self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("[{}] {}", self.error_code(), self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            RedditApiError::RateLimitExceeded { .. }
            | RedditApiError::RequestTimeout
            | RedditApiError::InvalidResponse { .. } => true,
            RedditApiError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit rejected the app credentials. Check reddit.client_id and reddit.client_secret."
                    .to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Reddit is rate limiting this app; wait {} seconds before refreshing again.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => {
                format!("Reddit refused access to {}; it may be private or quarantined.", resource)
            }
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit '{}' does not exist or is banned.", subreddit)
            }
            RedditApiError::InvalidToken => {
                "Reddit no longer accepts the access token; a new one is needed.".to_string()
            }
            RedditApiError::RequestTimeout => "Reddit did not answer in time.".to_string(),
            RedditApiError::InvalidResponse { .. } => {
                "Reddit sent a listing that could not be read.".to_string()
            }
            RedditApiError::ServerError { status_code } => {
                format!("Reddit is having trouble (HTTP {}).", status_code)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND",
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
        .to_string()
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!("[{}] {}", self.error_code(), self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("[{}] {}", self.error_code(), self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked | DatabaseError::TransactionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DatabaseError::DatabaseLocked => Some(Duration::from_secs(1)),
            DatabaseError::TransactionFailed { .. } => Some(Duration::from_millis(200)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { reason } => {
                format!("The post cache could not be opened: {}", reason)
            }
            DatabaseError::MigrationFailed { migration, .. } => {
                format!("The post cache table '{}' could not be created.", migration)
            }
            DatabaseError::TransactionFailed { .. } => {
                "New posts could not be written to the cache; they will be fetched again next run."
                    .to_string()
            }
            DatabaseError::DatabaseLocked => {
                "The post cache is busy. Is another seddit run using it?".to_string()
            }
            DatabaseError::CorruptDatabase { .. } => {
                "The post cache is corrupted and will be rebuilt.".to_string()
            }
            DatabaseError::IncompatibleVersion { found, .. } => format!(
                "The post cache was written by an incompatible version ({}) and will be rebuilt.",
                found
            ),
            DatabaseError::Sql(_) => "The post cache could not be read or written.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED",
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED",
            DatabaseError::TransactionFailed { .. } => "DB_TRANSACTION_FAILED",
            DatabaseError::DatabaseLocked => "DB_LOCKED",
            DatabaseError::CorruptDatabase { .. } => "DB_CORRUPT",
            DatabaseError::IncompatibleVersion { .. } => "DB_INCOMPATIBLE_VERSION",
            DatabaseError::Sql(_) => "DB_SQL_ERROR",
        }
        .to_string()
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("[{}] {}", self.error_code(), self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("[{}] {}", self.error_code(), self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("File '{}' was not found. Please check the path.", path)
            }
            ConfigError::InvalidFormat { details } => format!("Could not read {}", details),
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, value } => {
                format!("'{}' is not a valid value for '{}'.", value, field)
            }
            ConfigError::InvalidPattern { field, pattern, .. } => {
                format!("The {} pattern '{}' is not a valid regex.", field, pattern)
            }
            ConfigError::Parse(_) => {
                "Configuration file could not be parsed. Please check the TOML syntax.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT",
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::InvalidPattern { .. } => "CONFIG_INVALID_PATTERN",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
        .to_string()
    }
}

/// Reports failures at the binary's edge: fatal errors end the run,
/// warnings leave it going on cached data.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("{}", error.user_friendly_message());
    }

    pub fn report_warning(&self, error: &CoreError) {
        error.log_warn();
        info!("{}", error.user_friendly_message());
        if let Some(retry_after) = error.retry_after() {
            info!("Worth retrying in {:?}", retry_after);
        }
    }
}
