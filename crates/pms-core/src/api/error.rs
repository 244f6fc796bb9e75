use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Fragments that mark an error message as an authentication failure.
/// Matched case-insensitively with `_` read as a space.
const AUTH_FAILURE_PATTERNS: &[&str] = &[
    "token not valid",
    "not authenticated",
    "credentials",
    "expired",
    "authorization",
];

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Body of a failed response, kept for the caller to display.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Empty,
    Text(String),
    Json(Value),
}

impl ErrorBody {
    pub fn parse(raw: &[u8]) -> Self {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return ErrorBody::Empty;
        }
        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::String(text)) => ErrorBody::Text(text),
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Text(String::from_utf8_lossy(raw).into_owned()),
        }
    }

    /// The most descriptive message in the body.
    ///
    /// A plain-text body is its own message. For JSON the first non-empty of
    /// `detail`, `code`, `message` and `messages[0].message` wins.
    pub fn message(&self) -> Option<String> {
        match self {
            ErrorBody::Empty => None,
            ErrorBody::Text(text) => Some(text.clone()).filter(|t| !t.trim().is_empty()),
            ErrorBody::Json(value) => {
                let first_validation = value
                    .get("messages")
                    .and_then(|m| m.get(0))
                    .and_then(|m| m.get("message"));
                [
                    value.get("detail"),
                    value.get("code"),
                    value.get("message"),
                    first_validation,
                ]
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .find(|s| !s.trim().is_empty())
                .map(str::to_string)
            }
        }
    }

    fn summary(&self) -> String {
        match self {
            ErrorBody::Empty => "(empty body)".to_string(),
            ErrorBody::Text(text) => truncate_body(text),
            ErrorBody::Json(value) => truncate_body(&value.to_string()),
        }
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {}", .0.summary())]
    Unauthorized(ErrorBody),

    #[error("Access denied: {}", .0.summary())]
    AccessDenied(ErrorBody),

    #[error("Resource not found: {}", .0.summary())]
    NotFound(ErrorBody),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request rejected ({status}): {}", .body.summary())]
    Rejected { status: StatusCode, body: ErrorBody },

    #[error("Server error ({status}): {}", .body.summary())]
    ServerError { status: StatusCode, body: ErrorBody },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let body = ErrorBody::parse(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(body),
            403 => ApiError::AccessDenied(body),
            404 => ApiError::NotFound(body),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError { status, body },
            _ => ApiError::Rejected { status, body },
        }
    }

    /// HTTP status, for errors that came from a response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Rejected { status, .. } | ApiError::ServerError { status, .. } => {
                Some(*status)
            }
            ApiError::NetworkError(e) => e.status(),
            ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => None,
        }
    }

    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Unauthorized(body)
            | ApiError::AccessDenied(body)
            | ApiError::NotFound(body)
            | ApiError::Rejected { body, .. }
            | ApiError::ServerError { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether this error means the credential is missing, invalid or expired.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ApiError::Unauthorized(_) | ApiError::AccessDenied(_) => true,
            ApiError::NotFound(body)
            | ApiError::Rejected { body, .. }
            | ApiError::ServerError { body, .. } => body
                .message()
                .map(|message| looks_like_auth_failure(&message))
                .unwrap_or(false),
            _ => false,
        }
    }
}

fn looks_like_auth_failure(message: &str) -> bool {
    let normalized = message.to_lowercase().replace('_', " ");
    AUTH_FAILURE_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}
