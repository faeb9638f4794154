//! Classification of GitHub API failures.
//!
//! Every non-success response is turned into a [`GitHubError`] variant based on
//! its status code and rate-limit headers, so callers can tell "the repository
//! is gone" apart from "try again later" without looking at raw statuses.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Longest slice of a raw response body kept in an error message.
const MAX_BODY_IN_MESSAGE: usize = 300;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API error: 401 Unauthorized - {message}")]
    Unauthorized { message: String },

    #[error("GitHub API error: 403 Forbidden - {message}")]
    Forbidden { message: String },

    #[error("GitHub API error: 404 Not Found - {message}")]
    NotFound { message: String },

    #[error("GitHub API error: 422 Unprocessable Entity - {message}")]
    Validation { message: String },

    /// 429, or 403 with an exhausted quota; `status` is what GitHub sent
    #[error("GitHub API rate limit exceeded{} - {message}", retry_hint(.retry_after))]
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("GitHub API error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("GitHub API returned unexpected status {status} - {message}")]
    Unexpected { status: u16, message: String },

    #[error("Request to GitHub timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to make GitHub API request: {0}")]
    Transport(String),

    #[error("Failed to parse GitHub API response: {0}")]
    Decode(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

/// Error payload GitHub returns alongside 4xx responses.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

impl GitHubError {
    /// Classify a non-success response.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let message = extract_message(status, body);

        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && is_rate_limited(headers, &message))
        {
            return GitHubError::RateLimited {
                status: status.as_u16(),
                retry_after: retry_after(headers),
                message,
            };
        }

        match status {
            StatusCode::UNAUTHORIZED => GitHubError::Unauthorized { message },
            StatusCode::FORBIDDEN => GitHubError::Forbidden { message },
            StatusCode::NOT_FOUND => GitHubError::NotFound { message },
            StatusCode::UNPROCESSABLE_ENTITY => GitHubError::Validation { message },
            s if s.is_server_error() => GitHubError::Server {
                status: s.as_u16(),
                message,
            },
            s => GitHubError::Unexpected {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// HTTP status behind this error, if there was a response at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::Unauthorized { .. } => Some(401),
            GitHubError::Forbidden { .. } => Some(403),
            GitHubError::NotFound { .. } => Some(404),
            GitHubError::Validation { .. } => Some(422),
            GitHubError::RateLimited { status, .. }
            | GitHubError::Server { status, .. }
            | GitHubError::Unexpected { status, .. } => Some(*status),
            GitHubError::Timeout(_) | GitHubError::Transport(_) | GitHubError::Decode(_) => None,
        }
    }

    /// Whether re-running the same request later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GitHubError::RateLimited { .. }
                | GitHubError::Server { .. }
                | GitHubError::Timeout(_)
                | GitHubError::Transport(_)
        )
    }
}

fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message {
            let details: Vec<String> = payload
                .errors
                .iter()
                .filter_map(|e| {
                    e.get("message")
                        .and_then(|m| m.as_str())
                        .or_else(|| e.as_str())
                        .map(str::to_string)
                })
                .collect();
            return if details.is_empty() {
                message
            } else {
                format!("{} ({})", message, details.join(", "))
            };
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }
    trimmed.chars().take(MAX_BODY_IN_MESSAGE).collect()
}

fn is_rate_limited(headers: &HeaderMap, message: &str) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    exhausted || headers.contains_key("retry-after") || message.to_lowercase().contains("rate limit")
}

/// Wait time advertised by GitHub, from `Retry-After` or `X-RateLimit-Reset`.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }

    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(Duration::from_secs(reset.saturating_sub(now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_classify_statuses() {
        let headers = HeaderMap::new();
        let body = r#"{"message":"Not Found","documentation_url":"https://docs.github.com"}"#;

        assert_eq!(
            GitHubError::from_response(StatusCode::NOT_FOUND, &headers, body),
            GitHubError::NotFound {
                message: "Not Found".to_string()
            }
        );
        assert!(matches!(
            GitHubError::from_response(StatusCode::UNAUTHORIZED, &headers, "{}"),
            GitHubError::Unauthorized { .. }
        ));
        assert!(matches!(
            GitHubError::from_response(StatusCode::FORBIDDEN, &headers, r#"{"message":"Must have admin rights to Repository."}"#),
            GitHubError::Forbidden { .. }
        ));
        assert!(matches!(
            GitHubError::from_response(StatusCode::BAD_GATEWAY, &headers, ""),
            GitHubError::Server { status: 502, .. }
        ));
        assert!(matches!(
            GitHubError::from_response(StatusCode::CONFLICT, &headers, ""),
            GitHubError::Unexpected { status: 409, .. }
        ));
    }

    #[test]
    fn test_validation_message_includes_details() {
        let body = r#"{"message":"Validation Failed","errors":[{"resource":"Repository","code":"custom","message":"triage is not a valid permission"}]}"#;
        let err = GitHubError::from_response(StatusCode::UNPROCESSABLE_ENTITY, &HeaderMap::new(), body);
        assert_eq!(
            err,
            GitHubError::Validation {
                message: "Validation Failed (triage is not a valid permission)".to_string()
            }
        );
    }

    #[test]
    fn test_forbidden_with_exhausted_quota_is_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("retry-after", HeaderValue::from_static("60"));

        let err = GitHubError::from_response(
            StatusCode::FORBIDDEN,
            &headers,
            r#"{"message":"API rate limit exceeded"}"#,
        );
        assert_eq!(
            err,
            GitHubError::RateLimited {
                status: 403,
                retry_after: Some(Duration::from_secs(60)),
                message: "API rate limit exceeded".to_string()
            }
        );
        assert_eq!(err.status(), Some(403));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("retry after 60s"));
    }

    #[test]
    fn test_plain_text_body_is_kept() {
        let err = GitHubError::from_response(StatusCode::SERVICE_UNAVAILABLE, &HeaderMap::new(), "upstream down");
        assert_eq!(err.to_string(), "GitHub API error: 503 - upstream down");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_retryable() {
        assert!(GitHubError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!GitHubError::NotFound {
            message: String::new()
        }
        .is_retryable());
        assert!(!GitHubError::Decode("bad json".to_string()).is_retryable());
    }
}
