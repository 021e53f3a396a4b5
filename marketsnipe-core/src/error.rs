use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("Request failed: {message}")]
    RequestFailed {
        message: String,
        status_code: Option<u16>,
    },
}

impl CoreError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal {
            message: message.into(),
        }
    }

    /// Message of the innermost error, without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.to_string(),
            CoreError::Database(e) => e.to_string(),
            CoreError::Llm(e) => e.to_string(),
            CoreError::Scrape(e) => e.to_string(),
            CoreError::Config(e) => e.to_string(),
            CoreError::Internal { message } | CoreError::RequestFailed { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("{reason}")]
    InvalidUrl { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Post not found: {url}")]
    PostNotFound { url: String },

    #[error("Reddit fetch failed: {status_code}")]
    RequestFailed { status_code: u16 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("{details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

impl RedditApiError {
    /// HTTP status Reddit answered with, when the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RedditApiError::RateLimitExceeded { .. } => Some(429),
            RedditApiError::Forbidden { .. } => Some(403),
            RedditApiError::PostNotFound { .. } => Some(404),
            RedditApiError::RequestFailed { status_code }
            | RedditApiError::ServerError { status_code } => Some(*status_code),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("{var_name} is not set. Configure it in the server environment.")]
    MissingApiKey { provider: String, var_name: String },

    #[error("{provider} API Error: {status_code} - {body}")]
    RequestFailed {
        provider: String,
        status_code: u16,
        body: String,
    },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("No response content from {provider}")]
    EmptyResponse { provider: String },

    #[error("No choices returned from {provider}")]
    NoChoices { provider: String },

    #[error("Invalid response format from {provider}: {details}")]
    InvalidResponseFormat { provider: String, details: String },

    #[error("{details}")]
    InvalidRequest { details: String },
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("YELLOWCAKE_API_KEY is not configured")]
    MissingApiKey,

    #[error("Yellowcake upstream error: {status_code}")]
    Upstream { status_code: u16, details: String },

    #[error("Yellowcake upstream returned empty body")]
    EmptyBody,

    #[error("Stream error: {message}")]
    Stream { message: String },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Record not found: {table} {id}")]
    NotFound { table: String, id: i64 },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
