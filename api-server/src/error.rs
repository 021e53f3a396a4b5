use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use marketsnipe_core::{CoreError, ErrorExt, ErrorReporter, ScrapeError};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

/// JSON error body: `{"error": "..."}` plus `details` for upstream failures.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
    retry_after: Option<Duration>,
    /// Already logged with its error code when it was converted.
    reported: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            retry_after: None,
            reported: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Reports the error as a 500 whatever its own status, keeping the
    /// message and any `Retry-After`.
    pub fn into_server_error(mut self) -> Self {
        self.status = StatusCode::INTERNAL_SERVER_ERROR;
        self
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = StatusCode::from_u16(err.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let reporter = ErrorReporter::new();
        if status.is_server_error() {
            reporter.report_error(&err);
        } else {
            reporter.report_warning(&err);
        }

        let details = match &err {
            CoreError::Scrape(ScrapeError::Upstream { details, .. }) => Some(details.clone()),
            _ => None,
        };

        // Only throttling errors tell the client when to come back
        let retry_after = match &err {
            CoreError::RateLimited { .. } => err.retry_after(),
            _ if status == StatusCode::TOO_MANY_REQUESTS => err.retry_after(),
            _ => None,
        };

        Self {
            status,
            message: err.detail(),
            details,
            retry_after,
            reported: true,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() && !self.reported {
            error!("Request failed ({}): {}", self.status, self.message);
        }
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after.as_secs().into());
        }
        response
    }
}
