use crate::urls::{absolute_permalink, json_url, json_url_simple, validate_reddit_url};
use marketsnipe_core::{
    format_post_date, CoreError, MetricsCollector, PostDetails, PostSummary, RedditApiError,
    RequestMetrics,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POST_ENDPOINT: &str = "permalink.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub ups: i64,
}

impl From<RedditPostData> for PostDetails {
    fn from(post: RedditPostData) -> Self {
        Self {
            title: post.title,
            selftext: post.selftext,
            subreddit: post.subreddit,
            score: post.score,
            num_comments: post.num_comments,
            created_utc: post.created_utc,
            url: post.url,
            permalink: absolute_permalink(&post.permalink),
        }
    }
}

impl From<RedditPostData> for PostSummary {
    fn from(post: RedditPostData) -> Self {
        Self {
            date: format_post_date(post.created_utc),
            title: post.title,
            text: post.selftext,
            url: post.url,
            upvotes: post.ups,
            comments: post.num_comments,
            permalink: absolute_permalink(&post.permalink),
            subreddit: post.subreddit,
        }
    }
}

/// Pulls the post out of a thread response.
///
/// A thread is an array of two listings: the post (t3) and its comments (t1).
pub fn extract_post(thread: &Value) -> Option<RedditPostData> {
    let post = thread
        .get(0)?
        .get("data")?
        .get("children")?
        .get(0)?
        .get("data")?;
    serde_json::from_value(post.clone()).ok()
}

/// Client for Reddit's unauthenticated `<permalink>.json` endpoint.
#[derive(Debug)]
pub struct RedditJsonClient {
    http_client: Client,
    metrics: Arc<MetricsCollector>,
    user_agent: String,
}

impl RedditJsonClient {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            metrics: Arc::new(MetricsCollector::new()),
            user_agent,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub async fn fetch_thread(&self, json_url: &str) -> Result<Value, CoreError> {
        let start_time = Instant::now();
        let mut status_code = None;
        let mut rate_limited = false;

        info!("Fetching from Reddit: {}", json_url);
        let result = match self
            .http_client
            .get(json_url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                status_code = Some(status);

                if response.status().is_success() {
                    debug!("Request successful: {} for {}", status, json_url);
                    response.json::<Value>().await.map_err(|e| {
                        error!("Failed to decode Reddit response: {}", e);
                        CoreError::RedditApi(RedditApiError::InvalidResponse {
                            details: "Reddit returned a non-JSON body".to_string(),
                        })
                    })
                } else {
                    error!("Reddit fetch failed: {}", status);
                    rate_limited = status == 429;
                    Err(status_error(status, response.headers(), json_url))
                }
            }
            Err(e) => {
                error!("Network error for {}: {}", json_url, e);
                if e.is_timeout() {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint: POST_ENDPOINT.to_string(),
                method: "GET".to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited,
                error_type: result.as_ref().err().map(|e| e.to_string()),
            })
            .await;

        result
    }

    /// Lookup used by the `fetch-reddit-post` function.
    pub async fn fetch_post_details(&self, url: &str) -> Result<PostDetails, CoreError> {
        validate_reddit_url(url)?;
        let thread = self.fetch_thread(&json_url_simple(url)).await?;

        let post = extract_post(&thread).ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Could not parse post data from Reddit response".to_string(),
            })
        })?;

        Ok(post.into())
    }

    /// Lookup used by the queued proxy route.
    pub async fn fetch_post_summary(&self, url: &str) -> Result<PostSummary, CoreError> {
        let thread = self.fetch_thread(&json_url(url)?).await?;

        let post = extract_post(&thread).ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Not a valid post URL - no post data found".to_string(),
            })
        })?;

        info!("Success: {}...", post.title.chars().take(30).collect::<String>());
        Ok(post.into())
    }
}

fn status_error(status: u16, headers: &reqwest::header::HeaderMap, url: &str) -> CoreError {
    let error = match status {
        429 => {
            let retry_after = headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        403 => RedditApiError::Forbidden {
            resource: url.to_string(),
        },
        404 => RedditApiError::PostNotFound {
            url: url.to_string(),
        },
        500..=599 => RedditApiError::ServerError {
            status_code: status,
        },
        _ => RedditApiError::RequestFailed {
            status_code: status,
        },
    };
    CoreError::RedditApi(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thread_fixture() -> Value {
        json!([
            {
                "kind": "Listing",
                "data": {
                    "children": [{
                        "kind": "t3",
                        "data": {
                            "id": "abc123",
                            "title": "Stripe froze my payouts again",
                            "selftext": "Third time this quarter.",
                            "author": "shopowner",
                            "subreddit": "smallbusiness",
                            "url": "https://www.reddit.com/r/smallbusiness/comments/abc123/stripe/",
                            "permalink": "/r/smallbusiness/comments/abc123/stripe/",
                            "created_utc": 1640995200.0,
                            "score": 42,
                            "num_comments": 17,
                            "ups": 45
                        }
                    }],
                    "after": null,
                    "before": null
                }
            },
            {
                "kind": "Listing",
                "data": { "children": [], "after": null, "before": null }
            }
        ])
    }

    #[test]
    fn test_extract_post() {
        let post = extract_post(&thread_fixture()).unwrap();
        assert_eq!(post.id, "abc123");
        assert_eq!(post.ups, 45);

        assert!(extract_post(&json!([])).is_none());
        assert!(extract_post(&json!({"kind": "Listing"})).is_none());
    }

    #[test]
    fn test_post_details_conversion() {
        let details: PostDetails = extract_post(&thread_fixture()).unwrap().into();
        assert_eq!(details.title, "Stripe froze my payouts again");
        assert_eq!(details.score, 42);
        assert_eq!(details.num_comments, 17);
        assert_eq!(
            details.permalink,
            "https://www.reddit.com/r/smallbusiness/comments/abc123/stripe/"
        );
    }

    #[test]
    fn test_post_summary_conversion() {
        let summary: PostSummary = extract_post(&thread_fixture()).unwrap().into();
        assert_eq!(summary.date, "1/1/2022");
        assert_eq!(summary.text, "Third time this quarter.");
        assert_eq!(summary.upvotes, 45);
        assert_eq!(summary.comments, 17);
        assert_eq!(summary.subreddit, "smallbusiness");
    }

    #[tokio::test]
    async fn test_fetch_post_summary_from_mock() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/r/smallbusiness/comments/abc123/stripe.json")
            .match_header("accept", "application/json")
            .match_header("user-agent", "test-agent/1.0")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(thread_fixture().to_string())
            .create_async()
            .await;

        let client =
            RedditJsonClient::new("test-agent/1.0".to_string(), Duration::from_secs(5)).unwrap();
        let url = format!("{}/r/smallbusiness/comments/abc123/stripe/", server.url());
        let summary = client.fetch_post_summary(&url).await.unwrap();

        assert_eq!(summary.title, "Stripe froze my payouts again");
        mock.assert_async().await;

        let metrics = client.metrics().get_metrics().await;
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.successful_requests, 1);
    }

    #[tokio::test]
    async fn test_fetch_maps_status_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/r/gone/comments/x.json")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/r/busy/comments/y.json")
            .with_status(429)
            .with_header("retry-after", "12")
            .create_async()
            .await;

        let client =
            RedditJsonClient::new("test-agent/1.0".to_string(), Duration::from_secs(5)).unwrap();

        let err = client
            .fetch_post_summary(&format!("{}/r/gone/comments/x", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::PostNotFound { .. })
        ));

        let err = client
            .fetch_post_summary(&format!("{}/r/busy/comments/y", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 12 })
        ));

        let metrics = client.metrics().get_metrics().await;
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.rate_limited_requests, 1);
    }

    #[tokio::test]
    async fn test_missing_post_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/r/rust.json")
            .with_status(200)
            .with_body(r#"{"kind": "Listing", "data": {"children": []}}"#)
            .create_async()
            .await;

        let client =
            RedditJsonClient::new("test-agent/1.0".to_string(), Duration::from_secs(5)).unwrap();
        let err = client
            .fetch_post_summary(&format!("{}/r/rust/", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "Not a valid post URL - no post data found");
    }
}
