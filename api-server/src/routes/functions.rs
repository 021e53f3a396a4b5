//! Handlers for the `/functions/v1/*` routes the web app calls.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use llm_interface::PromptGenerator;
use marketsnipe_core::{
    CoreError, IdeaPost, LlmError, PostDetails, ProductContext, ScrapeError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{error, info};
use yellowcake_client::{error_frame, ByteStream, ExtractRequest};

const GENERATE_IDEAS_MODE: &str = "generate-ideas";

/// Non-string fields are treated as missing rather than rejected.
#[derive(Debug, Default, Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    product: Option<Value>,
    #[serde(default)]
    problem: Option<Value>,
    #[serde(default)]
    input: Option<Value>,
}

impl ContextRequest {
    fn context(&self) -> ProductContext {
        ProductContext::new(
            string_field(&self.product),
            string_field(&self.problem),
            string_field(&self.input),
        )
    }
}

fn string_field(value: &Option<Value>) -> &str {
    match value {
        Some(Value::String(text)) => text,
        _ => "",
    }
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: String,
}

/// `POST /functions/v1/generate-keywords`
pub async fn generate_keywords(
    State(state): State<AppState>,
    payload: Result<Json<ContextRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>, ApiError> {
    let Json(request) = payload?;
    let prompt = state.gemini.generate_instruction(&request.context()).await?;
    Ok(Json(PromptResponse { prompt }))
}

#[derive(Debug, Deserialize)]
pub struct OpenRouterRequest {
    #[serde(default)]
    mode: Option<String>,
    #[serde(flatten)]
    context: ContextRequest,
    #[serde(default)]
    posts: Option<Value>,
}

/// `POST /functions/v1/openrouter-call`
pub async fn openrouter_call(
    State(state): State<AppState>,
    payload: Result<Json<OpenRouterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let mode = request.mode.as_deref().unwrap_or("generate-prompt");
    info!("Operating in mode: {}", mode);

    if mode == GENERATE_IDEAS_MODE {
        let posts = idea_posts(request.posts)?;
        let ideas = state.openrouter.generate_ideas(&posts).await?;
        return Ok(Json(ideas).into_response());
    }

    let prompt = state
        .openrouter
        .generate_instruction(&request.context.context())
        .await?;
    Ok(Json(PromptResponse { prompt }).into_response())
}

fn idea_posts(posts: Option<Value>) -> Result<Vec<IdeaPost>, CoreError> {
    let missing = || {
        CoreError::from(LlmError::InvalidRequest {
            details: r#"Mode "generate-ideas" requires "posts" array in body."#.to_string(),
        })
    };
    match posts {
        Some(posts @ Value::Array(_)) => serde_json::from_value(posts).map_err(|_| missing()),
        _ => Err(missing()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    prompt: Option<String>,
}

/// `POST /functions/v1/yellowcake-scrape`
///
/// Once the stream has started, failures are reported inside it as an
/// `event: error` frame.
pub async fn yellowcake_scrape(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let prompt = request.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(ApiError::bad_request("Prompt is required"));
    }
    if !state.yellowcake.has_api_key() {
        return Err(ApiError::internal("YELLOWCAKE_API_KEY not configured"));
    }

    let yellowcake = state.yellowcake.clone();
    let extract = ExtractRequest::for_feed(prompt);
    info!("Starting feed extraction");

    let upstream = stream::once(async move { yellowcake.open_stream(&extract).await }).flat_map(
        |opened| -> ByteStream {
            match opened {
                Ok(upstream) => upstream,
                Err(e) => stream::iter([Err(e)]).boxed(),
            }
        },
    );

    Ok(event_stream(relay_with_error_frame(upstream)))
}

#[derive(Debug, Deserialize)]
pub struct PostCommentsRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

/// `POST /functions/v1/yellowcake-post-comments`
pub async fn yellowcake_post_comments(
    State(state): State<AppState>,
    payload: Result<Json<PostCommentsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !state.yellowcake.has_api_key() {
        return Err(CoreError::from(ScrapeError::MissingApiKey).into());
    }

    let Json(request) = payload?;
    let url = request.url.unwrap_or_default();
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    let extract = ExtractRequest::for_post(&url, request.prompt.as_deref().unwrap_or_default());
    info!("Proxying Yellowcake request for {}", extract.url);

    let upstream = state.yellowcake.open_stream(&extract).await?;
    Ok(event_stream(relay_with_error_frame(upstream)))
}

#[derive(Debug, Deserialize)]
pub struct RedditPostRequest {
    #[serde(default)]
    url: Option<String>,
}

/// `POST /functions/v1/fetch-reddit-post`
pub async fn fetch_reddit_post(
    State(state): State<AppState>,
    payload: Result<Json<RedditPostRequest>, JsonRejection>,
) -> Result<Json<PostDetails>, ApiError> {
    let Json(request) = payload?;
    let url = request.url.unwrap_or_default();

    let details = state.reddit.fetch_post_details(&url).await.map_err(|e| {
        match upstream_status(&e) {
            Some(status) => {
                error!("Error fetching reddit post: {}", e);
                ApiError::internal(format!("Reddit API responded with {}", status))
            }
            None => ApiError::from(e),
        }
    })?;

    Ok(Json(details))
}

/// Status code Reddit answered with, for errors that came from a response.
pub(crate) fn upstream_status(err: &CoreError) -> Option<u16> {
    match err {
        CoreError::RedditApi(e) => e.status_code(),
        _ => None,
    }
}

/// Forwards upstream chunks and turns the first failure into a final
/// `event: error` frame, after which the stream ends.
fn relay_with_error_frame<S>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<Bytes, CoreError>>,
{
    upstream.scan(false, |failed, item| {
        if *failed {
            return futures::future::ready(None);
        }
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Error in stream: {}", e);
                *failed = true;
                Bytes::from(error_frame(&stream_error_payload(&e)))
            }
        };
        futures::future::ready(Some(Ok(chunk)))
    })
}

fn stream_error_payload(err: &CoreError) -> Value {
    match err {
        CoreError::Scrape(ScrapeError::Upstream {
            status_code,
            details,
        }) => json!({
            "error": format!("Yellowcake API error: {}", status_code),
            "details": details,
        }),
        other => json!({ "error": other.detail() }),
    }
}

fn event_stream<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
