//! GitHub API client for repository invitation operations.
//!
//! Covers the three collaborator-invitation endpoints the reconciler needs:
//! listing pending invitations (following `Link` pagination), deleting one by
//! id, and inviting a user at a permission level.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{self, GitHubError};
use super::pagination;
use super::{CreateOutcome, DeleteOutcome, InvitationService};
use crate::config::{GitHubConfig, RetryConfig};
use crate::reconcile::{Invitation, PermissionLevel};

const API_VERSION: &str = "2022-11-28";

/// GitHub API client authenticated with a bearer token.
pub struct GitHubClient {
    access_token: Option<String>,
    api_url: String,
    per_page: u32,
    timeout: Duration,
    retry: RetryConfig,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn from_config(config: &GitHubConfig) -> anyhow::Result<Self> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            access_token: config.resolve_token(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            per_page: config.page_size(),
            timeout,
            retry: config.retry.clone(),
            client,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        match &self.access_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Send a request, retrying transient failures as configured.
    async fn send<F>(&self, operation: &'static str, build: F) -> Result<Response, GitHubError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0u32;

        loop {
            let outcome = build().send().await;

            let delay = match &outcome {
                Ok(response) if self.retry.should_retry(response.status().as_u16()) => Some(
                    error::retry_after(response.headers())
                        .unwrap_or_else(|| self.retry.calculate_backoff(attempt + 1)),
                ),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    Some(self.retry.calculate_backoff(attempt + 1))
                }
                _ => None,
            };

            match delay {
                Some(delay) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = delay.min(self.retry.max_backoff());
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying GitHub request"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return outcome.map_err(|e| self.transport_error(e)),
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> GitHubError {
        if err.is_timeout() {
            GitHubError::Timeout(self.timeout)
        } else {
            GitHubError::Transport(err.to_string())
        }
    }

    async fn into_error(response: Response) -> GitHubError {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        GitHubError::from_response(status, &headers, &body)
    }

    /// Fetch one page of invitations, returning the next page URL if any.
    pub async fn list_invitations_page(
        &self,
        url: &str,
    ) -> Result<(Vec<Invitation>, Option<String>), GitHubError> {
        let response = self
            .send("list_invitations", || self.request(Method::GET, url))
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }

        let next = pagination::next_page_url(response.headers());
        let page: Vec<RepositoryInvitation> = response
            .json()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))?;

        Ok((page.into_iter().map(Invitation::from).collect(), next))
    }

    /// List all pending invitations on a repository (paginated, fetching all pages).
    pub async fn list_all_invitations(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Invitation>, GitHubError> {
        let mut all_invitations = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(format!(
            "{}/repos/{}/{}/invitations?per_page={}",
            self.api_url, owner, repo, self.per_page
        ));

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                warn!(url = %url, "GitHub pagination looped back to a visited page, stopping");
                break;
            }

            let (invitations, next_url) = self.list_invitations_page(&url).await?;
            debug!(
                owner,
                repo,
                page = seen.len(),
                count = invitations.len(),
                "Fetched invitation page"
            );
            all_invitations.extend(invitations);
            next = next_url;
        }

        Ok(all_invitations)
    }

    /// Delete a pending invitation. A 404 means it is already gone.
    pub async fn remove_invitation(
        &self,
        owner: &str,
        repo: &str,
        invitation_id: u64,
    ) -> Result<DeleteOutcome, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/invitations/{}",
            self.api_url, owner, repo, invitation_id
        );

        let response = self
            .send("delete_invitation", || self.request(Method::DELETE, &url))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::AlreadyGone),
            s if s.is_success() => Ok(DeleteOutcome::Deleted),
            _ => Err(Self::into_error(response).await),
        }
    }

    /// Invite a user as a collaborator.
    ///
    /// GitHub answers 201 with the invitation when one was created (or an
    /// existing pending one refreshed) and 204 when the user already has access.
    pub async fn add_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        permission: PermissionLevel,
    ) -> Result<CreateOutcome, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/collaborators/{}",
            self.api_url, owner, repo, username
        );
        let body = AddCollaboratorRequest { permission };

        let response = self
            .send("create_invitation", || {
                self.request(Method::PUT, &url).json(&body)
            })
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                let invitation: CreatedInvitation = response
                    .json()
                    .await
                    .map_err(|e| GitHubError::Decode(e.to_string()))?;
                Ok(CreateOutcome::Created {
                    invitation_id: invitation.id,
                })
            }
            StatusCode::NO_CONTENT => Ok(CreateOutcome::AlreadyCollaborator),
            s if s.is_success() => Err(GitHubError::Unexpected {
                status: s.as_u16(),
                message: "unexpected success status for collaborator invite".to_string(),
            }),
            _ => Err(Self::into_error(response).await),
        }
    }
}

#[async_trait]
impl InvitationService for GitHubClient {
    async fn list_invitations(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Invitation>, GitHubError> {
        self.list_all_invitations(owner, repo).await
    }

    async fn delete_invitation(
        &self,
        owner: &str,
        repo: &str,
        invitation_id: u64,
    ) -> Result<DeleteOutcome, GitHubError> {
        self.remove_invitation(owner, repo, invitation_id).await
    }

    async fn create_invitation(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        permission: PermissionLevel,
    ) -> Result<CreateOutcome, GitHubError> {
        self.add_collaborator(owner, repo, username, permission).await
    }
}

// Response types

/// A repository invitation as returned by `GET /repos/{owner}/{repo}/invitations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInvitation {
    pub id: u64,
    pub invitee: Option<SimpleUser>,
    pub permissions: Option<String>,
    pub created_at: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleUser {
    pub login: String,
    pub id: Option<u64>,
}

impl From<RepositoryInvitation> for Invitation {
    fn from(inv: RepositoryInvitation) -> Self {
        Self {
            id: inv.id,
            invitee_login: inv.invitee.map(|u| u.login),
            permissions: inv.permissions,
        }
    }
}

// Invite types

#[derive(Debug, Serialize)]
struct AddCollaboratorRequest {
    permission: PermissionLevel,
}

#[derive(Debug, Deserialize)]
struct CreatedInvitation {
    id: u64,
}
