use super::{require_context, require_key, PromptGenerator};
use crate::prompt::{
    ideas_system_prompt, ideas_user_prompt, openrouter_instruction_prompt, snippet,
    strip_code_fences,
};
use async_trait::async_trait;
use marketsnipe_core::{
    CoreError, IdeaPost, IdeasResponse, LlmError, MetricsCollector, OpenRouterConfig,
    ProductContext, RequestMetrics, OPENROUTER_API_KEY_VAR,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const PROVIDER: &str = "OpenRouter";
const ENDPOINT: &str = "openrouter:chat/completions";

#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
    model: String,
    referer: String,
    title: String,
    api_key: Option<String>,
    metrics: Arc<MetricsCollector>,
}

impl OpenRouterProvider {
    pub fn new(config: &OpenRouterConfig, api_key: Option<String>) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            api_key,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Asks for three product ideas grounded in the given posts.
    ///
    /// Any valid JSON answer is returned exactly as the model wrote it. Text
    /// that does not parse still succeeds, as an empty idea list with the
    /// raw text attached.
    pub async fn generate_ideas(&self, posts: &[IdeaPost]) -> Result<Value, CoreError> {
        let api_key = require_key(self.api_key.as_deref(), PROVIDER, OPENROUTER_API_KEY_VAR)?;

        info!("Generating ideas from {} posts", posts.len());
        let messages = vec![
            ChatMessage::system(ideas_system_prompt()),
            ChatMessage::user(ideas_user_prompt(posts)),
        ];
        let text = self.chat(api_key, messages).await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(ideas) => Ok(ideas),
            Err(e) => {
                warn!("Failed to parse ideas JSON: {}", e);
                let fallback = IdeasResponse {
                    ideas: Vec::new(),
                    raw: Some(text),
                    error: Some("Failed to parse JSON".to_string()),
                };
                Ok(serde_json::to_value(fallback)?)
            }
        }
    }

    async fn chat(&self, api_key: &str, messages: Vec<ChatMessage>) -> Result<String, CoreError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.4,
            max_tokens: 8192,
            top_p: 0.95,
            top_k: 40,
        };

        info!("Calling {} ({})", PROVIDER, self.model);
        let start_time = Instant::now();
        let (status_code, outcome) = match self.send(api_key, &request).await {
            Ok((status, text)) => (Some(status), Ok(text)),
            Err((status, e)) => (status, Err(e)),
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint: ENDPOINT.to_string(),
                method: "POST".to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: outcome.is_ok(),
                rate_limited: status_code == Some(429),
                error_type: outcome.as_ref().err().map(|e| e.to_string()),
            })
            .await;

        outcome.map(|text| strip_code_fences(&text))
    }

    async fn send(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<(u16, String), (Option<u16>, CoreError)> {
        let response = self
            .client
            .post(format!("{}/api/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(request)
            .send()
            .await
            .map_err(|e| (None, CoreError::Network(e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} API Error: {}", PROVIDER, body);
            return Err((
                Some(status),
                LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    status_code: status,
                    body,
                }
                .into(),
            ));
        }

        let data: ChatResponse = response.json().await.map_err(|e| {
            (
                Some(status),
                CoreError::from(LlmError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    details: e.to_string(),
                }),
            )
        })?;

        let choice = data.choices.into_iter().next().ok_or_else(|| {
            error!("No choices in {} response", PROVIDER);
            (
                Some(status),
                CoreError::from(LlmError::NoChoices {
                    provider: PROVIDER.to_string(),
                }),
            )
        })?;

        let text = choice
            .message
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                (
                    Some(status),
                    CoreError::from(LlmError::EmptyResponse {
                        provider: PROVIDER.to_string(),
                    }),
                )
            })?;

        Ok((status, text))
    }
}

#[async_trait]
impl PromptGenerator for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate_instruction(&self, context: &ProductContext) -> Result<String, CoreError> {
        let api_key = require_key(self.api_key.as_deref(), PROVIDER, OPENROUTER_API_KEY_VAR)?;
        require_context(context)?;

        debug!(
            "Building prompt for context: {}...",
            snippet(&context.context_line(), 80)
        );
        let messages = vec![ChatMessage::user(openrouter_instruction_prompt(context))];
        self.chat(api_key, messages).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
