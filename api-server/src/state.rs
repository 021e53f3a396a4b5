use database::Database;
use llm_interface::{GeminiProvider, OpenRouterProvider};
use marketsnipe_core::{
    AppConfig, CoreError, MetricsCollector, PostSummary, RedditConfig, GEMINI_API_KEY_VAR,
    OPENROUTER_API_KEY_VAR, YELLOWCAKE_API_KEY_VAR,
};
use reddit_client::{Pacing, RedditJsonClient, RequestQueue, ResponseCache};
use std::sync::Arc;
use tracing::{info, warn};
use yellowcake_client::YellowcakeClient;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Browser-like client for single post lookups.
    pub reddit: Arc<RedditJsonClient>,
    /// Paced, cached queue behind `/api/reddit-meta`.
    pub reddit_queue: RequestQueue,
    pub gemini: Arc<GeminiProvider>,
    pub openrouter: Arc<OpenRouterProvider>,
    pub yellowcake: Arc<YellowcakeClient>,
    pub database: Arc<Database>,
    /// Upstream call metrics shared by every client above.
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Builds every client, opens the database and starts the Reddit queue worker.
    pub async fn build(config: AppConfig) -> Result<Self, CoreError> {
        let metrics = Arc::new(MetricsCollector::new());
        let secrets = config.secrets.clone();

        for (var_name, value) in [
            (GEMINI_API_KEY_VAR, &secrets.gemini_api_key),
            (OPENROUTER_API_KEY_VAR, &secrets.openrouter_api_key),
            (YELLOWCAKE_API_KEY_VAR, &secrets.yellowcake_api_key),
        ] {
            if value.is_none() {
                warn!("{} is not set; routes that need it will fail", var_name);
            }
        }

        let reddit = Arc::new(
            RedditJsonClient::new(config.reddit.user_agent.clone(), config.reddit.timeout())?
                .with_metrics(metrics.clone()),
        );

        let proxy_client = Arc::new(
            RedditJsonClient::new(
                config.reddit.proxy_user_agent.clone(),
                config.reddit.timeout(),
            )?
            .with_metrics(metrics.clone()),
        );
        let reddit_queue = RequestQueue::with_cache(
            proxy_client,
            Pacing::from_config(&config.reddit),
            proxy_cache(&config.reddit),
        )
        .with_max_queue_size(config.reddit.max_queue_size);

        let gemini = Arc::new(
            GeminiProvider::new(&config.gemini, secrets.gemini_api_key)?
                .with_metrics(metrics.clone()),
        );
        let openrouter = Arc::new(
            OpenRouterProvider::new(&config.openrouter, secrets.openrouter_api_key)?
                .with_metrics(metrics.clone()),
        );
        let yellowcake = Arc::new(
            YellowcakeClient::new(&config.yellowcake, secrets.yellowcake_api_key)?
                .with_metrics(metrics.clone()),
        );

        let mut database = Database::new(config.database.url.clone());
        database.connect().await?;
        database.run_migrations().await?;

        info!(
            "Application state ready (gemini model {}, openrouter model {})",
            gemini.model(),
            openrouter.model()
        );

        Ok(Self {
            config: Arc::new(config),
            reddit,
            reddit_queue,
            gemini,
            openrouter,
            yellowcake,
            database: Arc::new(database),
            metrics,
        })
    }
}

fn proxy_cache(config: &RedditConfig) -> ResponseCache<PostSummary> {
    match config.max_cache_entries {
        Some(max) => ResponseCache::new().with_max_entries(max),
        None => ResponseCache::new(),
    }
}
