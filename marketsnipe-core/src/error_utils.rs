use crate::error::*;
use std::fmt::Display;
use std::time::Duration;
use tracing::{error, info, warn};

/// Classification helpers shared by the HTTP layer and the CLI.
pub trait ErrorExt: Display {
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> &'static str;
    fn http_status(&self) -> u16;

    fn log_error(&self) -> &Self
    where
        Self: Sized,
    {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self
    where
        Self: Sized,
    {
        warn!(code = self.error_code(), "{}", self);
        self
    }
}

const UNEXPECTED: &str = "An unexpected error occurred. Please try again later.";

impl ErrorExt for RedditApiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedditApiError::RateLimitExceeded { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::ServerError { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            // Reddit asks scrapers to back off longer than the other upstreams
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::InvalidUrl { reason } => reason.clone(),
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Reddit is rate limiting us. Please wait {} seconds before trying again.",
                retry_after
            ),
            RedditApiError::Forbidden { .. } => {
                "Reddit refused access. The post may be private or quarantined.".to_string()
            }
            RedditApiError::PostNotFound { .. } => "That Reddit post could not be found.".to_string(),
            RedditApiError::RequestTimeout => {
                "Request to Reddit timed out. Please try again.".to_string()
            }
            _ => UNEXPECTED.to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::InvalidUrl { .. } => "REDDIT_INVALID_URL",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            _ => "REDDIT_API",
        }
    }

    fn http_status(&self) -> u16 {
        match self {
            RedditApiError::InvalidUrl { .. } => 400,
            _ => 500,
        }
    }
}

impl ErrorExt for DatabaseError {
    fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::ConnectionFailed { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        self.is_retryable().then(|| Duration::from_secs(1))
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::NotFound { table, id } => format!("No {} record with id {}.", table, id),
            _ => UNEXPECTED.to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::NotFound { .. } => "DB_NOT_FOUND",
            _ => "DATABASE",
        }
    }

    fn http_status(&self) -> u16 {
        match self {
            DatabaseError::NotFound { .. } => 404,
            _ => 500,
        }
    }
}

impl ErrorExt for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimitExceeded { .. } => true,
            LlmError::RequestFailed { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(10)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::MissingApiKey { var_name, .. } => {
                format!("{} is not configured on this server.", var_name)
            }
            LlmError::InvalidRequest { details } => details.clone(),
            LlmError::EmptyResponse { provider } | LlmError::NoChoices { provider } => {
                format!("{} returned an empty answer. Please try again.", provider)
            }
            _ => UNEXPECTED.to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            LlmError::MissingApiKey { .. } => "LLM_MISSING_API_KEY",
            _ => "LLM",
        }
    }

    fn http_status(&self) -> u16 {
        500
    }
}

impl ErrorExt for ScrapeError {
    fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Upstream { status_code, .. } => *status_code == 429 || *status_code >= 500,
            ScrapeError::Stream { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.is_retryable().then(|| Duration::from_secs(10))
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ScrapeError::MissingApiKey => "Scraping is not configured on this server.".to_string(),
            ScrapeError::Upstream { status_code, .. } => format!(
                "The scraping service rejected the request (status {}).",
                status_code
            ),
            ScrapeError::Stream { .. } => {
                "The scraping stream was interrupted. Please try again.".to_string()
            }
            ScrapeError::EmptyBody => UNEXPECTED.to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ScrapeError::MissingApiKey => "SCRAPE_MISSING_API_KEY",
            ScrapeError::Upstream { .. } => "SCRAPE_UPSTREAM",
            _ => "SCRAPE",
        }
    }

    fn http_status(&self) -> u16 {
        match self {
            ScrapeError::Upstream { status_code, .. } => *status_code,
            ScrapeError::EmptyBody => 502,
            _ => 500,
        }
    }
}

impl ErrorExt for ConfigError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::FileNotFound { path } => format!(
                "Configuration file '{}' not found. Pass --config with a valid path.",
                path
            ),
            ConfigError::InvalidValue { field, .. } => {
                format!("Configuration value '{}' is invalid.", field)
            }
            ConfigError::Parse(_) => "Configuration file could not be parsed.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        "CONFIG"
    }

    fn http_status(&self) -> u16 {
        500
    }
}

impl CoreError {
    fn category(&self) -> Option<&dyn ErrorExt> {
        match self {
            CoreError::RedditApi(e) => Some(e),
            CoreError::Database(e) => Some(e),
            CoreError::Llm(e) => Some(e),
            CoreError::Scrape(e) => Some(e),
            CoreError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl ErrorExt for CoreError {
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Network(_) | CoreError::Timeout { .. } | CoreError::RateLimited { .. } => {
                true
            }
            _ => self.category().is_some_and(|e| e.is_retryable()),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            CoreError::RateLimited { retry_after, .. } => *retry_after,
            CoreError::Network(_) => Some(Duration::from_secs(10)),
            _ => self.category().and_then(|e| e.retry_after()),
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::InvalidInput { message } => message.clone(),
            CoreError::Network(_) => {
                "Could not reach an upstream service. Please try again.".to_string()
            }
            CoreError::RateLimited { message, .. } => {
                format!("{}. Please wait before trying again.", message)
            }
            _ => self
                .category()
                .map(|e| e.user_friendly_message())
                .unwrap_or_else(|| UNEXPECTED.to_string()),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Internal { .. } => "INTERNAL",
            CoreError::RateLimited { .. } => "RATE_LIMITED",
            CoreError::RequestFailed { .. } => "REQUEST_FAILED",
            _ => self.category().map_or("INTERNAL", |e| e.error_code()),
        }
    }

    fn http_status(&self) -> u16 {
        match self {
            CoreError::InvalidInput { .. } => 400,
            CoreError::NotFound { .. } => 404,
            _ => self.category().map_or(500, |e| e.http_status()),
        }
    }
}

/// Logs an error once with its code, the message shown to users and, for
/// retryable errors, when to come back.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    /// Returns the user-facing message so callers can show it.
    pub fn report_error<E: ErrorExt>(&self, error: &E) -> String {
        let message = error.user_friendly_message();
        if self.report_errors {
            error.log_error();
            info!(code = error.error_code(), "User message: {}", message);
            if let Some(retry_after) = error.retry_after() {
                info!("Retryable after {:?}", retry_after);
            }
        }
        message
    }

    pub fn report_warning<E: ErrorExt>(&self, error: &E) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
