use super::{require_context, require_key, PromptGenerator};
use crate::prompt::{scraper_instruction_prompt, snippet, strip_code_fences};
use async_trait::async_trait;
use marketsnipe_core::{
    CoreError, GeminiConfig, LlmError, MetricsCollector, ProductContext, RequestMetrics,
    GEMINI_API_KEY_VAR,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const PROVIDER: &str = "Gemini";
const ENDPOINT: &str = "gemini:generateContent";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    metrics: Arc<MetricsCollector>,
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig, api_key: Option<String>) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
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

    async fn generate_content(&self, api_key: &str, text: String) -> Result<String, CoreError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.25,
                max_output_tokens: 200,
                top_p: 0.9,
            },
        };

        info!("Calling {} ({})", PROVIDER, self.model);
        let start_time = Instant::now();
        let result = self.send(&url, api_key, &request).await;

        let (status_code, outcome) = match result {
            Ok((status, body)) => (Some(status), Ok(body)),
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

        outcome
    }

    async fn send(
        &self,
        url: &str,
        api_key: &str,
        request: &GeminiRequest,
    ) -> Result<(u16, String), (Option<u16>, CoreError)> {
        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
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

        let data: GeminiResponse = response.json().await.map_err(|e| {
            (
                Some(status),
                CoreError::from(LlmError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    details: e.to_string(),
                }),
            )
        })?;

        let text = data
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        match text {
            Some(text) => Ok((status, text)),
            None => {
                error!("No text in {} response", PROVIDER);
                Err((
                    Some(status),
                    LlmError::EmptyResponse {
                        provider: PROVIDER.to_string(),
                    }
                    .into(),
                ))
            }
        }
    }
}

#[async_trait]
impl PromptGenerator for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate_instruction(&self, context: &ProductContext) -> Result<String, CoreError> {
        require_context(context)?;
        let api_key = require_key(self.api_key.as_deref(), PROVIDER, GEMINI_API_KEY_VAR)?;

        debug!(
            "Building prompt for context: {}...",
            snippet(&context.context_line(), 80)
        );
        let raw = self
            .generate_content(api_key, scraper_instruction_prompt(context))
            .await?;

        let prompt = strip_code_fences(&raw);
        info!("Generated prompt snippet: {}", snippet(&prompt, 120));
        Ok(prompt)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    fn provider(base_url: String, api_key: Option<&str>) -> GeminiProvider {
        let config = GeminiConfig {
            base_url,
            ..GeminiConfig::default()
        };
        GeminiProvider::new(&config, api_key.map(str::to_string)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_instruction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::UrlEncoded("key".to_string(), "test-key".to_string()))
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": { "maxOutputTokens": 200 }
            })))
            .with_status(200)
            .with_body(
                json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": "```\nReturn exactly 10 items. Output each as {post_link}.\n```" }] }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let gemini = provider(server.url(), Some("test-key"));
        let prompt = gemini
            .generate_instruction(&ProductContext::new("Ledgerly", "late invoices", ""))
            .await
            .unwrap();

        assert_eq!(prompt, "Return exactly 10 items. Output each as {post_link}.");
        mock.assert_async().await;

        let metrics = gemini.metrics.get_endpoint_metrics(ENDPOINT).await.unwrap();
        assert_eq!(metrics.success_count, 1);
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let err = provider(server.url(), Some("bad"))
            .generate_instruction(&ProductContext::new("", "", "meal kits"))
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "Gemini API Error: 403 - API key not valid");
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let err = provider(server.url(), Some("test-key"))
            .generate_instruction(&ProductContext::new("", "", "meal kits"))
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "No response content from Gemini");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let err = provider("http://127.0.0.1:9".to_string(), None)
            .generate_instruction(&ProductContext::new("", "", "meal kits"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Llm(LlmError::MissingApiKey { .. })));
    }

    #[tokio::test]
    async fn test_empty_context_rejected() {
        let err = provider("http://127.0.0.1:9".to_string(), Some("k"))
            .generate_instruction(&ProductContext::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.detail(),
            "Provide either product/problem fields or a single input string."
        );
    }
}
