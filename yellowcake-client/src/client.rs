use crate::sse::{SseEvent, SseParser, StreamMessage};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use marketsnipe_core::{
    CoreError, MetricsCollector, RequestMetrics, ScrapeError, YellowcakeConfig,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

const ENDPOINT: &str = "yellowcake:extract-stream";

pub const REDDIT_FEED_URL: &str = "https://old.reddit.com/";
pub const DEFAULT_POST_PROMPT: &str =
    r#"Return exactly 3 items that highlight pain points. Output each as "comment_text""#;

/// Raw upstream body, forwarded chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, CoreError>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
    pub prompt: String,
    #[serde(
        rename = "authorizedURLs",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub authorized_urls: Vec<String>,
}

impl ExtractRequest {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prompt: prompt.into(),
            authorized_urls: Vec::new(),
        }
    }

    /// Extraction over the Reddit front page.
    pub fn for_feed(prompt: impl Into<String>) -> Self {
        Self {
            url: REDDIT_FEED_URL.to_string(),
            prompt: prompt.into(),
            authorized_urls: vec![
                "https://old.reddit.com/".to_string(),
                "https://www.reddit.com/".to_string(),
            ],
        }
    }

    /// Extraction over a single post's comment thread.
    pub fn for_post(url: &str, prompt: &str) -> Self {
        let prompt = prompt.trim();
        Self {
            url: to_old_reddit(url),
            prompt: if prompt.is_empty() {
                DEFAULT_POST_PROMPT.to_string()
            } else {
                prompt.to_string()
            },
            authorized_urls: vec![
                "https://old.reddit.com/".to_string(),
                "https://www.reddit.com/".to_string(),
                "https://reddit.com/".to_string(),
            ],
        }
    }
}

/// Points a Reddit URL at old.reddit.com, which renders without scripts.
pub fn to_old_reddit(raw_url: &str) -> String {
    let trimmed = raw_url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed)
            if parsed
                .host_str()
                .is_some_and(|host| host.contains("reddit.com")) =>
        {
            match parsed.set_host(Some("old.reddit.com")) {
                Ok(()) => parsed.to_string(),
                Err(_) => trimmed.to_string(),
            }
        }
        _ => trimmed.to_string(),
    }
}

/// Everything an extraction stream produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractOutcome {
    pub items: Vec<Value>,
    pub stages: Vec<String>,
    pub chunks: Vec<String>,
    pub errors: Vec<Value>,
    pub completed: bool,
}

impl ExtractOutcome {
    fn apply(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Progress(_) => {
                if let Some(stage) = message.stage() {
                    debug!("Stage: {}", stage);
                    self.stages.push(stage.to_string());
                }
            }
            StreamMessage::Chunk(token) => self.chunks.push(token),
            StreamMessage::Complete(_) => {
                if let Some(items) = message.items() {
                    info!("Final payload received: {} items", items.len());
                    self.items = items.clone();
                }
                self.completed = true;
            }
            StreamMessage::Error(value) => {
                warn!("Yellowcake reported an error: {}", value);
                self.errors.push(value);
            }
            StreamMessage::Done => self.completed = true,
            StreamMessage::Other(value) => debug!("Ignoring event payload: {}", value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct YellowcakeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    metrics: Arc<MetricsCollector>,
}

impl YellowcakeClient {
    pub fn new(config: &YellowcakeConfig, api_key: Option<String>) -> Result<Self, CoreError> {
        // No overall timeout: extractions stream for minutes
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, CoreError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| CoreError::from(ScrapeError::MissingApiKey))
    }

    /// Starts an extraction and hands back the upstream event stream untouched.
    pub async fn open_stream(&self, request: &ExtractRequest) -> Result<ByteStream, CoreError> {
        let api_key = self.api_key()?;
        info!(
            "API Key prefix: {}...",
            api_key.chars().take(10).collect::<String>()
        );
        info!("Calling Yellowcake for {}", request.url);

        let start_time = Instant::now();
        let result = self.send(api_key, request).await;

        let status_code = match &result {
            Ok(response) => Some(response.status().as_u16()),
            Err(CoreError::Scrape(ScrapeError::Upstream { status_code, .. })) => Some(*status_code),
            Err(_) => None,
        };
        self.metrics
            .record_request(RequestMetrics {
                endpoint: ENDPOINT.to_string(),
                method: "POST".to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited: status_code == Some(429),
                error_type: result.as_ref().err().map(|e| e.to_string()),
            })
            .await;

        let response = result?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CoreError::from))
            .boxed())
    }

    async fn send(
        &self,
        api_key: &str,
        request: &ExtractRequest,
    ) -> Result<reqwest::Response, CoreError> {
        let response = self
            .client
            .post(format!("{}/v1/extract-stream", self.base_url))
            .header("X-API-Key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        info!("Yellowcake API response status: {}", status.as_u16());

        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            error!("Yellowcake upstream error {}: {}", status.as_u16(), details);
            return Err(ScrapeError::Upstream {
                status_code: status.as_u16(),
                details,
            }
            .into());
        }

        if response.content_length() == Some(0) {
            error!("Yellowcake upstream returned empty body");
            return Err(ScrapeError::EmptyBody.into());
        }

        Ok(response)
    }

    /// Runs an extraction to completion and collects what it produced.
    pub async fn extract(&self, request: &ExtractRequest) -> Result<ExtractOutcome, CoreError> {
        let mut stream = self.open_stream(request).await?;
        let mut parser = SseParser::new();
        let mut outcome = ExtractOutcome::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ScrapeError::Stream {
                message: e.to_string(),
            })?;
            for event in parser.feed(&chunk) {
                apply_event(&mut outcome, &event);
            }
        }
        if let Some(event) = parser.finish() {
            apply_event(&mut outcome, &event);
        }

        info!(
            "Stream complete: {} items, {} errors",
            outcome.items.len(),
            outcome.errors.len()
        );
        Ok(outcome)
    }
}

fn apply_event(outcome: &mut ExtractOutcome, event: &SseEvent) {
    outcome.apply(StreamMessage::classify(event));
}
