use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post metadata as returned by the `fetch-reddit-post` function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetails {
    pub title: String,
    pub selftext: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: u64,
    pub created_utc: f64,
    pub url: String,
    pub permalink: String,
}

/// Post metadata as returned by the proxy route, shaped for result cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub date: String,
    pub title: String,
    pub text: String,
    pub url: String,
    pub upvotes: i64,
    pub comments: u64,
    pub permalink: String,
    pub subreddit: String,
}

/// Formats a unix timestamp as `M/D/YYYY` in UTC.
pub fn format_post_date(created_utc: f64) -> String {
    DateTime::from_timestamp(created_utc.trunc() as i64, 0)
        .map(|dt| dt.format("%-m/%-d/%Y").to_string())
        .unwrap_or_default()
}

/// Startup description supplied by the user, either as separate product and
/// problem fields or as one free-form input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductContext {
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub input: String,
}

impl ProductContext {
    pub fn new(
        product: impl Into<String>,
        problem: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into().trim().to_string(),
            problem: problem.into().trim().to_string(),
            input: input.into().trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.product.is_empty() && self.problem.is_empty() && self.input.is_empty()
    }

    pub fn context_line(&self) -> String {
        if !self.input.is_empty() {
            return self.input.clone();
        }
        format!(
            "Product: {} | Problem solved: {}",
            or_na(&self.product),
            or_na(&self.problem)
        )
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// A scraped post handed to idea generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdeaPost {
    Text(String),
    Post {
        #[serde(default)]
        title: String,
        #[serde(default)]
        text: String,
    },
}

impl IdeaPost {
    pub fn content(&self) -> String {
        match self {
            IdeaPost::Text(text) => text.clone(),
            IdeaPost::Post { title, text } => format!("{}\n{}", title, text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductIdea {
    pub title: String,
    pub description: String,
    pub why_it_works: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeasResponse {
    #[serde(default)]
    pub ideas: Vec<ProductIdea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Running => "running",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ProjectStatus::Pending),
            "running" => Some(ProjectStatus::Running),
            "completed" => Some(ProjectStatus::Completed),
            "failed" => Some(ProjectStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub user_id: String,
    pub query: String,
    pub status: ProjectStatus,
    pub matches_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub user_id: String,
    pub query: String,
    #[serde(default = "default_status")]
    pub status: ProjectStatus,
    #[serde(default)]
    pub matches_count: i64,
}

fn default_status() -> ProjectStatus {
    ProjectStatus::Pending
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedComment {
    pub id: i64,
    pub user_id: String,
    pub project_id: i64,
    pub comment_text: String,
    pub source_url: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSavedComment {
    pub user_id: String,
    pub project_id: i64,
    pub comment_text: String,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_author")]
    pub author: String,
}

fn default_source_url() -> String {
    "Reddit".to_string()
}

fn default_author() -> String {
    "Unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_line_prefers_input() {
        let ctx = ProductContext::new("Ledger", "tracking", "  budgeting app for students ");
        assert_eq!(ctx.context_line(), "budgeting app for students");
    }

    #[test]
    fn test_context_line_fills_missing_fields() {
        let ctx = ProductContext::new("Ledger", "", "");
        assert_eq!(ctx.context_line(), "Product: Ledger | Problem solved: N/A");
        assert!(!ctx.is_empty());
        assert!(ProductContext::new(" ", "\n", "").is_empty());
    }

    #[test]
    fn test_idea_post_content() {
        let posts: Vec<IdeaPost> =
            serde_json::from_str(r#"["plain text", {"title": "Title", "text": "Body"}]"#)
                .unwrap();
        assert_eq!(posts[0].content(), "plain text");
        assert_eq!(posts[1].content(), "Title\nBody");
    }

    #[test]
    fn test_format_post_date() {
        // 2022-01-01T00:00:00Z
        assert_eq!(format_post_date(1640995200.0), "1/1/2022");
        assert_eq!(format_post_date(1700000000.5), "11/14/2023");
    }

    #[test]
    fn test_saved_comment_defaults() {
        let comment: NewSavedComment = serde_json::from_str(
            r#"{"user_id": "u1", "project_id": 7, "comment_text": "too many review texts"}"#,
        )
        .unwrap();
        assert_eq!(comment.source_url, "Reddit");
        assert_eq!(comment.author, "Unknown");
    }

    #[test]
    fn test_project_status_round_trip() {
        for status in [
            ProjectStatus::Pending,
            ProjectStatus::Running,
            ProjectStatus::Completed,
            ProjectStatus::Failed,
        ] {
            assert_eq!(ProjectStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProjectStatus::parse("archived"), None);
    }
}
