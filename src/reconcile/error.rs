//! Failure taxonomy for a reconcile run.
//!
//! An invitation that is already gone, or a user who is already a
//! collaborator, is not an error: those come back from the service as
//! `DeleteOutcome::AlreadyGone` and `CreateOutcome::AlreadyCollaborator`.

use crate::github::GitHubError;

use super::types::ErrorKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    /// Missing or malformed input, caught before any network call
    #[error("{0}")]
    Validation(String),

    /// Repository missing or invisible to the configured token
    #[error("{step}: {source}")]
    NotFound { step: String, source: GitHubError },

    /// Token lacks rights to manage collaborators
    #[error("{step}: {source}")]
    Authorization { step: String, source: GitHubError },

    /// Timeouts, network failures, rate limiting and 5xx; safe to re-run
    #[error("{step}: {source} (transient, safe to retry)")]
    Transient { step: String, source: GitHubError },

    /// GitHub refused the request as invalid (422)
    #[error("{step}: {source}")]
    Rejected { step: String, source: GitHubError },

    /// Anything else the service answered that we do not understand
    #[error("{step}: {source}")]
    Service { step: String, source: GitHubError },
}

impl ReconcileError {
    pub fn from_github(step: impl Into<String>, source: GitHubError) -> Self {
        let step = step.into();
        if source.is_retryable() {
            return ReconcileError::Transient { step, source };
        }
        match source {
            GitHubError::NotFound { .. } => ReconcileError::NotFound { step, source },
            GitHubError::Unauthorized { .. } | GitHubError::Forbidden { .. } => {
                ReconcileError::Authorization { step, source }
            }
            GitHubError::Validation { .. } => ReconcileError::Rejected { step, source },
            _ => ReconcileError::Service { step, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Validation(_) => ErrorKind::Validation,
            ReconcileError::NotFound { .. } => ErrorKind::NotFound,
            ReconcileError::Authorization { .. } => ErrorKind::Authorization,
            ReconcileError::Transient { .. } => ErrorKind::Transient,
            ReconcileError::Rejected { .. } => ErrorKind::Rejected,
            ReconcileError::Service { .. } => ErrorKind::Service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_github_errors_map_to_kinds() {
        let cases = [
            (
                GitHubError::NotFound {
                    message: "Not Found".to_string(),
                },
                ErrorKind::NotFound,
            ),
            (
                GitHubError::Forbidden {
                    message: "Must have admin rights".to_string(),
                },
                ErrorKind::Authorization,
            ),
            (
                GitHubError::Unauthorized {
                    message: "Bad credentials".to_string(),
                },
                ErrorKind::Authorization,
            ),
            (
                GitHubError::RateLimited {
                    status: 429,
                    retry_after: None,
                    message: "slow down".to_string(),
                },
                ErrorKind::Transient,
            ),
            (GitHubError::Timeout(Duration::from_secs(30)), ErrorKind::Transient),
            (
                GitHubError::Validation {
                    message: "Validation Failed".to_string(),
                },
                ErrorKind::Rejected,
            ),
            (
                GitHubError::Server {
                    status: 502,
                    message: "Bad Gateway".to_string(),
                },
                ErrorKind::Transient,
            ),
            (
                GitHubError::Unexpected {
                    status: 409,
                    message: "Conflict".to_string(),
                },
                ErrorKind::Service,
            ),
            (GitHubError::Decode("eof".to_string()), ErrorKind::Service),
        ];

        for (source, kind) in cases {
            assert_eq!(ReconcileError::from_github("step", source).kind(), kind);
        }
    }

    #[test]
    fn test_transient_message_mentions_retry() {
        let err = ReconcileError::from_github(
            "Failed to invite octocat",
            GitHubError::Timeout(Duration::from_secs(30)),
        );
        assert_eq!(
            err.to_string(),
            "Failed to invite octocat: Request to GitHub timed out after 30s (transient, safe to retry)"
        );
    }
}
