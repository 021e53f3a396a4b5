use marketsnipe_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, LlmError, RedditApiError,
    ScrapeError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::RequestTimeout);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::NotFound {
        table: "projects".to_string(),
        id: 4,
    });
    assert_eq!(db_error.error_code(), "DB_NOT_FOUND");

    let key_error = CoreError::Scrape(ScrapeError::MissingApiKey);
    assert_eq!(key_error.error_code(), "SCRAPE_MISSING_API_KEY");

    let llm_error = CoreError::Llm(LlmError::EmptyResponse {
        provider: "Gemini".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let scrape_error = CoreError::Scrape(ScrapeError::EmptyBody);
    assert_eq!(scrape_error.error_code(), "SCRAPE");

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "YELLOWCAKE_API_KEY".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let upstream_busy = CoreError::Scrape(ScrapeError::Upstream {
        status_code: 503,
        details: "busy".to_string(),
    });
    assert!(upstream_busy.is_retryable());

    let non_retryable_error = CoreError::invalid_input("URL is required");
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let timeout_error = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(30)));
}

#[test]
fn test_http_status_mapping() {
    assert_eq!(CoreError::invalid_input("Prompt is required").http_status(), 400);
    assert_eq!(
        CoreError::RedditApi(RedditApiError::InvalidUrl {
            reason: "Invalid Reddit URL".to_string()
        })
        .http_status(),
        400
    );
    assert_eq!(
        CoreError::Scrape(ScrapeError::Upstream {
            status_code: 402,
            details: "{\"detail\":\"out of credits\"}".to_string(),
        })
        .http_status(),
        402
    );
    assert_eq!(CoreError::Scrape(ScrapeError::EmptyBody).http_status(), 502);
    assert_eq!(
        CoreError::RedditApi(RedditApiError::RequestFailed { status_code: 404 }).http_status(),
        500
    );
    assert_eq!(
        CoreError::Llm(LlmError::MissingApiKey {
            provider: "Gemini".to_string(),
            var_name: "GEMINI_API_KEY".to_string(),
        })
        .http_status(),
        500
    );
}

#[test]
fn test_detail_strips_category_prefix() {
    let error = CoreError::Llm(LlmError::MissingApiKey {
        provider: "Gemini".to_string(),
        var_name: "GEMINI_API_KEY".to_string(),
    });
    assert!(error.to_string().starts_with("LLM error: "));
    assert_eq!(
        error.detail(),
        "GEMINI_API_KEY is not set. Configure it in the server environment."
    );

    let error = CoreError::invalid_input("url is required");
    assert_eq!(error.detail(), "url is required");
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::RequestTimeout);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("timed out"));

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "GEMINI_API_KEY".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("GEMINI_API_KEY"));
}

#[test]
fn test_backoff_per_upstream() {
    let reddit_busy = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert_eq!(reddit_busy.retry_after(), Some(Duration::from_secs(30)));

    let queue_full = CoreError::RateLimited {
        message: "Request queue is full".to_string(),
        retry_after: Some(Duration::from_secs(60)),
    };
    assert_eq!(queue_full.retry_after(), Some(Duration::from_secs(60)));
    assert_eq!(queue_full.http_status(), 500);

    let db_down = CoreError::Database(DatabaseError::ConnectionFailed {
        reason: "locked".to_string(),
    });
    assert_eq!(db_down.retry_after(), Some(Duration::from_secs(1)));

    let bad_input = CoreError::invalid_input("url is required");
    assert_eq!(bad_input.retry_after(), None);
    assert_eq!(bad_input.user_friendly_message(), "url is required");
}

#[test]
fn test_sub_errors_classify_themselves() {
    let invalid_url = RedditApiError::InvalidUrl {
        reason: "Invalid Reddit URL".to_string(),
    };
    assert_eq!(invalid_url.http_status(), 400);
    assert_eq!(invalid_url.error_code(), "REDDIT_INVALID_URL");
    assert_eq!(invalid_url.user_friendly_message(), "Invalid Reddit URL");

    let upstream = ScrapeError::Upstream {
        status_code: 429,
        details: "slow down".to_string(),
    };
    assert_eq!(upstream.http_status(), 429);
    assert_eq!(upstream.retry_after(), Some(Duration::from_secs(10)));

    let missing = DatabaseError::NotFound {
        table: "saved_comments".to_string(),
        id: 9,
    };
    assert_eq!(missing.http_status(), 404);
    assert_eq!(missing.user_friendly_message(), "No saved_comments record with id 9.");

    let empty = LlmError::NoChoices {
        provider: "OpenRouter".to_string(),
    };
    assert!(!empty.is_retryable());
    assert_eq!(empty.http_status(), 500);

    let config = ConfigError::InvalidValue {
        field: "reddit.jitter".to_string(),
        value: "3000 > 1000".to_string(),
    };
    assert_eq!(config.error_code(), "CONFIG");
    assert_eq!(config.retry_after(), None);
}

#[test]
fn test_core_error_delegates_to_category() {
    let sub = ScrapeError::Stream {
        message: "connection reset".to_string(),
    };
    let (code, status, message) = (sub.error_code(), sub.http_status(), sub.user_friendly_message());

    let core = CoreError::from(sub);
    assert_eq!(core.error_code(), code);
    assert_eq!(core.http_status(), status);
    assert_eq!(core.user_friendly_message(), message);
    assert!(core.is_retryable());
}

#[test]
fn test_reporter_returns_user_message() {
    let reporter = ErrorReporter::new();
    let error = CoreError::RedditApi(RedditApiError::PostNotFound {
        url: "https://www.reddit.com/r/rust/comments/gone/".to_string(),
    });
    assert_eq!(reporter.report_error(&error), "That Reddit post could not be found.");

    let quiet = ErrorReporter::new()
        .with_error_reporting(false)
        .with_warning_reporting(false);
    let error = LlmError::MissingApiKey {
        provider: "Gemini".to_string(),
        var_name: "GEMINI_API_KEY".to_string(),
    };
    assert_eq!(
        quiet.report_error(&error),
        "GEMINI_API_KEY is not configured on this server."
    );
    quiet.report_warning(&error);
}
