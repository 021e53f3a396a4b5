use marketsnipe_core::{CoreError, RedditApiError};
use url::Url;

pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

pub fn validate_reddit_url(url: &str) -> Result<(), CoreError> {
    if url.trim().is_empty() {
        return Err(CoreError::invalid_input("URL is required"));
    }
    if !url.contains("reddit.com") {
        return Err(RedditApiError::InvalidUrl {
            reason: "Invalid Reddit URL".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Drops one trailing slash from the raw string and appends `.json`.
pub fn json_url_simple(url: &str) -> String {
    let base = url.strip_suffix('/').unwrap_or(url);
    format!("{}.json", base)
}

/// Appends `.json` to the path component, leaving query and fragment intact.
pub fn json_url(url: &str) -> Result<String, CoreError> {
    let mut parsed = Url::parse(url.trim()).map_err(|e| RedditApiError::InvalidUrl {
        reason: format!("Invalid URL: {}", e),
    })?;

    let path = parsed.path();
    let path = path.strip_suffix('/').unwrap_or(path);
    let json_path = format!("{}.json", path);
    parsed.set_path(&json_path);

    Ok(parsed.to_string())
}

pub fn absolute_permalink(permalink: &str) -> String {
    format!("{}{}", REDDIT_WEB_BASE, permalink)
}
