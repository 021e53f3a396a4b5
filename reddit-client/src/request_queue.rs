use crate::api::RedditJsonClient;
use crate::cache::ResponseCache;
use marketsnipe_core::{CoreError, PostSummary, RedditConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Delay the worker waits after each upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Fixed(Duration),
    Jitter { min: Duration, max: Duration },
}

impl Pacing {
    pub fn from_config(config: &RedditConfig) -> Self {
        match &config.jitter {
            Some(jitter) => Pacing::Jitter {
                min: Duration::from_millis(jitter.min_ms),
                max: Duration::from_millis(jitter.max_ms),
            },
            None => Pacing::Fixed(config.request_delay()),
        }
    }

    pub fn next_delay(&self) -> Duration {
        match *self {
            Pacing::Fixed(delay) => delay,
            Pacing::Jitter { min, max } => {
                let min_ms = min.as_millis() as u64;
                let max_ms = (max.as_millis() as u64).max(min_ms);
                Duration::from_millis(fastrand::u64(min_ms..=max_ms))
            }
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(Duration::from_millis(2500))
    }
}

#[derive(Debug)]
struct QueuedLookup {
    url: String,
    reply: oneshot::Sender<Result<PostSummary, CoreError>>,
}

/// Single-worker FIFO in front of Reddit's JSON endpoint.
///
/// At most one upstream request is in flight. Successful lookups are cached
/// by the URL exactly as submitted.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<QueuedLookup>,
    cache: ResponseCache<PostSummary>,
    pending: Arc<AtomicUsize>,
    max_queue_size: Option<usize>,
}

impl RequestQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn start(client: Arc<RedditJsonClient>, pacing: Pacing) -> Self {
        Self::with_cache(client, pacing, ResponseCache::new())
    }

    pub fn with_cache(
        client: Arc<RedditJsonClient>,
        pacing: Pacing,
        cache: ResponseCache<PostSummary>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_worker(
            receiver,
            client,
            cache.clone(),
            pending.clone(),
            pacing,
        ));

        Self {
            sender,
            cache,
            pending,
            max_queue_size: None,
        }
    }

    pub fn with_max_queue_size(mut self, max_queue_size: Option<usize>) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub async fn submit(&self, url: &str) -> Result<PostSummary, CoreError> {
        if let Some(cached) = self.cache.get(url).await {
            info!("Cache hit: {}", url);
            return Ok(cached);
        }

        if let Some(max) = self.max_queue_size {
            if self.queue_len() >= max {
                warn!("Request queue is full ({} pending)", max);
                return Err(CoreError::RateLimited {
                    message: "Request queue is full".to_string(),
                    retry_after: Some(Duration::from_secs(60)),
                });
            }
        }

        let (reply, receiver) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self
            .sender
            .send(QueuedLookup {
                url: url.to_string(),
                reply,
            })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(CoreError::internal("Request queue worker has stopped"));
        }
        info!("Queue size: {}", self.queue_len());

        receiver
            .await
            .map_err(|_| CoreError::internal("Request queue dropped the lookup"))?
    }

    /// Lookups waiting for or being handled by the worker.
    pub fn queue_len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &ResponseCache<PostSummary> {
        &self.cache
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<QueuedLookup>,
    client: Arc<RedditJsonClient>,
    cache: ResponseCache<PostSummary>,
    pending: Arc<AtomicUsize>,
    pacing: Pacing,
) {
    info!("Starting Reddit request queue worker ({:?})", pacing);

    while let Some(job) = receiver.recv().await {
        // Another lookup for the same URL may have landed while this one waited
        if let Some(cached) = cache.get(&job.url).await {
            debug!("Cache hit at queue time: {}", job.url);
            pending.fetch_sub(1, Ordering::SeqCst);
            let _ = job.reply.send(Ok(cached));
            continue;
        }

        let result = client.fetch_post_summary(&job.url).await;
        match &result {
            Ok(summary) => cache.insert(job.url.clone(), summary.clone()).await,
            Err(e) => error!("Proxy error for {}: {}", job.url, e),
        }

        pending.fetch_sub(1, Ordering::SeqCst);
        if job.reply.send(result).is_err() {
            debug!("Caller for {} went away before the reply", job.url);
        }

        let delay = pacing.next_delay();
        debug!("Waiting {:?} before next Reddit request", delay);
        sleep(delay).await;
    }

    info!("Reddit request queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketsnipe_core::JitterConfig;
    use std::time::Instant;

    fn thread_body(title: &str) -> String {
        serde_json::json!([
            {
                "kind": "Listing",
                "data": {
                    "children": [{
                        "kind": "t3",
                        "data": {
                            "title": title,
                            "selftext": "body",
                            "subreddit": "smallbusiness",
                            "url": "https://www.reddit.com/r/smallbusiness/comments/q/",
                            "permalink": "/r/smallbusiness/comments/q/",
                            "created_utc": 1700000000.0,
                            "ups": 3,
                            "num_comments": 1
                        }
                    }]
                }
            }
        ])
        .to_string()
    }

    fn test_client() -> Arc<RedditJsonClient> {
        Arc::new(
            RedditJsonClient::new("test-agent/1.0".to_string(), Duration::from_secs(5)).unwrap(),
        )
    }

    #[test]
    fn test_pacing_from_config() {
        let mut config = RedditConfig::default();
        assert_eq!(
            Pacing::from_config(&config),
            Pacing::Fixed(Duration::from_millis(2500))
        );

        config.jitter = Some(JitterConfig {
            min_ms: 500,
            max_ms: 2500,
        });
        assert_eq!(
            Pacing::from_config(&config),
            Pacing::Jitter {
                min: Duration::from_millis(500),
                max: Duration::from_millis(2500),
            }
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let pacing = Pacing::Jitter {
            min: Duration::from_millis(500),
            max: Duration::from_millis(2500),
        };
        for _ in 0..200 {
            let delay = pacing.next_delay();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(2500));
        }
        assert_eq!(Pacing::default().next_delay(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_successful_lookup_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/r/smallbusiness/comments/q.json")
            .with_status(200)
            .with_body(thread_body("Payroll is a nightmare"))
            .expect(1)
            .create_async()
            .await;

        let queue = RequestQueue::start(test_client(), Pacing::Fixed(Duration::from_millis(10)));
        let url = format!("{}/r/smallbusiness/comments/q/", server.url());

        let first = queue.submit(&url).await.unwrap();
        let second = queue.submit(&url).await.unwrap();

        assert_eq!(first.title, "Payroll is a nightmare");
        assert_eq!(second.title, first.title);
        assert_eq!(queue.cache().len().await, 1);
        assert_eq!(queue.queue_len(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/r/gone/comments/z.json")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let queue = RequestQueue::start(test_client(), Pacing::Fixed(Duration::from_millis(10)));
        let url = format!("{}/r/gone/comments/z", server.url());

        assert!(queue.submit(&url).await.is_err());
        assert!(queue.submit(&url).await.is_err());
        assert!(queue.cache().is_empty().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookups_are_paced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/r/a/comments/1.json")
            .with_status(200)
            .with_body(thread_body("first"))
            .create_async()
            .await;
        server
            .mock("GET", "/r/b/comments/2.json")
            .with_status(200)
            .with_body(thread_body("second"))
            .create_async()
            .await;

        let queue = RequestQueue::start(test_client(), Pacing::Fixed(Duration::from_millis(200)));
        let first_url = format!("{}/r/a/comments/1", server.url());
        let second_url = format!("{}/r/b/comments/2", server.url());

        let started = Instant::now();
        let (first, second) = tokio::join!(queue.submit(&first_url), queue.submit(&second_url));

        assert_eq!(first.unwrap().title, "first");
        assert_eq!(second.unwrap().title, "second");
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_failed_lookup_still_paces_next() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/r/down/comments/4.json")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/r/up/comments/5.json")
            .with_status(200)
            .with_body(thread_body("after failure"))
            .create_async()
            .await;

        let queue = RequestQueue::start(test_client(), Pacing::Fixed(Duration::from_millis(200)));
        let failing_url = format!("{}/r/down/comments/4", server.url());
        let next_url = format!("{}/r/up/comments/5", server.url());

        let started = Instant::now();
        let (failed, next) = tokio::join!(queue.submit(&failing_url), queue.submit(&next_url));

        assert!(failed.is_err());
        assert_eq!(next.unwrap().title, "after failure");
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_queue_time_cache_hit_adds_no_delay() {
        let mut server = mockito::Server::new_async().await;
        let dup = server
            .mock("GET", "/r/dup/comments/6.json")
            .with_status(200)
            .with_body(thread_body("dup"))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/r/other/comments/7.json")
            .with_status(200)
            .with_body(thread_body("other"))
            .create_async()
            .await;

        let delay = Duration::from_millis(300);
        let queue = RequestQueue::start(test_client(), Pacing::Fixed(delay));
        let dup_url = format!("{}/r/dup/comments/6", server.url());
        let other_url = format!("{}/r/other/comments/7", server.url());

        // fetch, wait, cache hit, fetch: only one delay in total
        let started = Instant::now();
        let (first, again, other) = tokio::join!(
            queue.submit(&dup_url),
            queue.submit(&dup_url),
            queue.submit(&other_url)
        );
        let elapsed = started.elapsed();

        assert_eq!(first.unwrap().title, "dup");
        assert_eq!(again.unwrap().title, "dup");
        assert_eq!(other.unwrap().title, "other");
        assert!(elapsed >= delay);
        assert!(elapsed < delay * 2, "took {:?}", elapsed);
        dup.assert_async().await;
    }

    #[tokio::test]
    async fn test_duplicate_lookup_hits_cache_at_queue_time() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/r/dup/comments/3.json")
            .with_status(200)
            .with_body(thread_body("dup"))
            .expect(1)
            .create_async()
            .await;

        let queue = RequestQueue::start(test_client(), Pacing::Fixed(Duration::from_millis(50)));
        let url = format!("{}/r/dup/comments/3", server.url());

        let (a, b) = tokio::join!(queue.submit(&url), queue.submit(&url));
        assert_eq!(a.unwrap().title, "dup");
        assert_eq!(b.unwrap().title, "dup");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        let queue = RequestQueue::start(test_client(), Pacing::default())
            .with_max_queue_size(Some(0));

        let err = queue
            .submit("https://www.reddit.com/r/rust/comments/abc/")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RateLimited { .. }));
    }
}
