use crate::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const OPENROUTER_API_KEY_VAR: &str = "OPENROUTER_API_KEY";
pub const YELLOWCAKE_API_KEY_VAR: &str = "YELLOWCAKE_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub yellowcake: YellowcakeConfig,
    /// Secrets are never read from the file, only from the environment.
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub yellowcake_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env_non_empty(GEMINI_API_KEY_VAR),
            openrouter_api_key: env_non_empty(OPENROUTER_API_KEY_VAR),
            yellowcake_api_key: env_non_empty(YELLOWCAKE_API_KEY_VAR),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://marketsnipe.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditConfig {
    /// User-Agent for single post lookups.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// User-Agent for the queued proxy route.
    #[serde(default = "default_proxy_user_agent")]
    pub proxy_user_agent: String,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Randomize the delay between queued requests instead of using a fixed one.
    #[serde(default)]
    pub jitter: Option<JitterConfig>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_queue_size: Option<usize>,
    /// Oldest proxy responses are evicted past this many. Unbounded when unset.
    #[serde(default)]
    pub max_cache_entries: Option<usize>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            proxy_user_agent: default_proxy_user_agent(),
            request_delay_ms: default_request_delay_ms(),
            jitter: None,
            timeout_secs: default_timeout_secs(),
            max_queue_size: None,
            max_cache_entries: None,
        }
    }
}

impl RedditConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JitterConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_proxy_user_agent() -> String {
    "web:marketsnipe-analysis:v1.0.0".to_string()
}

fn default_request_delay_ms() -> u64 {
    2500
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    #[serde(default = "default_openrouter_model")]
    pub model: String,
    #[serde(default = "default_openrouter_referer")]
    pub referer: String,
    #[serde(default = "default_openrouter_title")]
    pub title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_base_url(),
            model: default_openrouter_model(),
            referer: default_openrouter_referer(),
            title: default_openrouter_title(),
        }
    }
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai".to_string()
}

fn default_openrouter_model() -> String {
    "google/gemini-2.5-flash-lite".to_string()
}

fn default_openrouter_referer() -> String {
    "https://github.com/CaptainCrasi/uottahack2026".to_string()
}

fn default_openrouter_title() -> String {
    "Yellowcake Scraper".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct YellowcakeConfig {
    #[serde(default = "default_yellowcake_base_url")]
    pub base_url: String,
}

impl Default for YellowcakeConfig {
    fn default() -> Self {
        Self {
            base_url: default_yellowcake_base_url(),
        }
    }
}

fn default_yellowcake_base_url() -> String {
    "https://api.yellowcake.dev".to_string()
}

impl AppConfig {
    /// Loads configuration from an optional TOML file, then applies
    /// environment overrides and secrets.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }),
            _ => CoreError::Io(e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(bind) = env_non_empty("MARKETSNIPE_BIND") {
            self.server.bind = bind;
        }
        if let Some(url) = env_non_empty("DATABASE_URL") {
            self.database.url = url;
        }
        self.secrets = Secrets::from_env();
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(jitter) = &self.reddit.jitter {
            if jitter.min_ms > jitter.max_ms {
                return Err(ConfigError::InvalidValue {
                    field: "reddit.jitter".to_string(),
                    value: format!("min_ms {} > max_ms {}", jitter.min_ms, jitter.max_ms),
                }
                .into());
            }
        }
        if self.reddit.max_queue_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "reddit.max_queue_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
