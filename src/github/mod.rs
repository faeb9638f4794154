//! GitHub integration for collaborator invitations.
//!
//! This module provides:
//! - The `InvitationService` seam the reconciler talks to
//! - A reqwest-based client implementing it against the REST API
//! - Error classification and `Link` header pagination

pub mod api_client;
pub mod error;
pub mod pagination;

pub use api_client::GitHubClient;
pub use error::GitHubError;

use async_trait::async_trait;

use crate::reconcile::{Invitation, PermissionLevel};

/// Result of deleting a pending invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The invitation no longer exists (accepted, declined, or removed by someone else)
    AlreadyGone,
}

/// Result of inviting a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { invitation_id: u64 },
    /// The user already has access; nothing was created
    AlreadyCollaborator,
}

/// Collaborator-invitation operations of the hosting service.
#[async_trait]
pub trait InvitationService: Send + Sync {
    /// All pending invitations on the repository, every page included.
    async fn list_invitations(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Invitation>, GitHubError>;

    async fn delete_invitation(
        &self,
        owner: &str,
        repo: &str,
        invitation_id: u64,
    ) -> Result<DeleteOutcome, GitHubError>;

    async fn create_invitation(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        permission: PermissionLevel,
    ) -> Result<CreateOutcome, GitHubError>;
}
