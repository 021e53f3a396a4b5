use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Totals for every call made to Reddit, Gemini, OpenRouter and Yellowcake.
///
/// Times are reported in milliseconds so the snapshot can go straight into
/// the `/health` body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpstreamMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_ms: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub endpoints: BTreeMap<String, EndpointMetrics>,
}

/// Counters for one upstream endpoint, e.g. `gemini:generateContent`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_ms: u64,
    pub min_response_ms: Option<u64>,
    pub max_response_ms: u64,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
}

/// One finished upstream call.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
    pub error_type: Option<String>,
}

impl EndpointMetrics {
    fn record(&mut self, sample: &RequestMetrics, elapsed_ms: u64) {
        self.request_count += 1;
        self.total_response_ms += elapsed_ms;
        self.min_response_ms = Some(self.min_response_ms.map_or(elapsed_ms, |m| m.min(elapsed_ms)));
        self.max_response_ms = self.max_response_ms.max(elapsed_ms);
        if sample.status_code.is_some() {
            self.last_status = sample.status_code;
        }

        if sample.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
            self.last_error = sample.error_type.clone();
        }
    }

    pub fn average_response_ms(&self) -> u64 {
        self.total_response_ms
            .checked_div(self.request_count)
            .unwrap_or_default()
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.request_count as f64
    }
}

/// Shared by every upstream client behind an `Arc`.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: RwLock<Totals>,
}

#[derive(Debug, Default)]
struct Totals {
    snapshot: UpstreamMetrics,
    total_response_ms: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, sample: RequestMetrics) {
        let elapsed_ms = u64::try_from(sample.response_time.as_millis()).unwrap_or(u64::MAX);
        let mut totals = self.inner.write().await;
        totals.total_response_ms = totals.total_response_ms.saturating_add(elapsed_ms);

        let total_response_ms = totals.total_response_ms;
        let metrics = &mut totals.snapshot;
        metrics.total_requests += 1;
        metrics.last_request_at = Some(Utc::now());
        if sample.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }
        if sample.rate_limited {
            metrics.rate_limited_requests += 1;
        }
        metrics.average_response_ms = total_response_ms / metrics.total_requests;

        metrics
            .endpoints
            .entry(sample.endpoint.clone())
            .or_default()
            .record(&sample, elapsed_ms);
    }

    pub async fn get_metrics(&self) -> UpstreamMetrics {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn get_endpoint_metrics(&self, endpoint: &str) -> Option<EndpointMetrics> {
        self.inner.read().await.snapshot.endpoints.get(endpoint).cloned()
    }

    pub async fn reset_metrics(&self) {
        *self.inner.write().await = Totals::default();
    }

    pub async fn export_metrics(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.get_metrics().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(endpoint: &str, millis: u64, status: u16) -> RequestMetrics {
        let success = (200..300).contains(&status);
        RequestMetrics {
            endpoint: endpoint.to_string(),
            method: "POST".to_string(),
            status_code: Some(status),
            response_time: Duration::from_millis(millis),
            success,
            rate_limited: status == 429,
            error_type: (!success).then(|| format!("upstream returned {}", status)),
        }
    }

    #[tokio::test]
    async fn test_totals_across_upstreams() {
        let collector = MetricsCollector::new();
        collector.record_request(call("gemini:generateContent", 100, 200)).await;
        collector.record_request(call("permalink.json", 300, 429)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.rate_limited_requests, 1);
        assert_eq!(metrics.average_response_ms, 200);
        assert!(metrics.last_request_at.is_some());
        assert_eq!(metrics.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_endpoint_counters() {
        let collector = MetricsCollector::new();
        collector.record_request(call("yellowcake:extract-stream", 100, 200)).await;
        collector.record_request(call("yellowcake:extract-stream", 50, 402)).await;

        let endpoint = collector
            .get_endpoint_metrics("yellowcake:extract-stream")
            .await
            .unwrap();
        assert_eq!(endpoint.request_count, 2);
        assert_eq!(endpoint.min_response_ms, Some(50));
        assert_eq!(endpoint.max_response_ms, 100);
        assert_eq!(endpoint.average_response_ms(), 75);
        assert_eq!(endpoint.success_rate(), 0.5);
        assert_eq!(endpoint.last_status, Some(402));
        assert_eq!(endpoint.last_error.as_deref(), Some("upstream returned 402"));

        assert!(collector
            .get_endpoint_metrics("openrouter:chat/completions")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_export_and_reset() {
        let collector = MetricsCollector::new();
        collector.record_request(call("permalink.json", 150, 200)).await;

        let exported = collector.export_metrics().await.unwrap();
        assert!(exported.contains("\"total_requests\": 1"));
        assert!(exported.contains("permalink.json"));

        collector.reset_metrics().await;
        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.average_response_ms, 0);
    }
}
