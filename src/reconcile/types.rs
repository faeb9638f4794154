use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ReconcileError;

/// Access tier granted to a collaborator, ordered from least to most access.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Read-only access
    Pull,
    Triage,
    /// Read/write access, what students normally get
    #[default]
    Push,
    Maintain,
    Admin,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 5] = [
        PermissionLevel::Pull,
        PermissionLevel::Triage,
        PermissionLevel::Push,
        PermissionLevel::Maintain,
        PermissionLevel::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Pull => "pull",
            PermissionLevel::Triage => "triage",
            PermissionLevel::Push => "push",
            PermissionLevel::Maintain => "maintain",
            PermissionLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PermissionLevel::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "Invalid permission '{}': expected one of pull, triage, push, maintain, admin",
                    wanted
                )
            })
    }
}

/// A validated reconcile request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub owner: String,
    pub repo: String,
    pub username: String,
    pub permission: PermissionLevel,
    #[serde(default)]
    pub dry_run: bool,
}

impl ReconcileRequest {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        username: impl Into<String>,
        permission: PermissionLevel,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            username: username.into(),
            permission,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// `owner/repo`, for log lines and messages.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Untrusted request as it arrives from the form or the CLI.
///
/// Every field is optional so that a missing value becomes a validation
/// message instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileInput {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

/// A pending collaborator invitation on the target repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: u64,
    pub invitee_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl Invitation {
    /// Logins on GitHub are case-insensitive.
    pub fn is_for(&self, username: &str) -> bool {
        self.invitee_login
            .as_deref()
            .map(|login| login.eq_ignore_ascii_case(username))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedInvitation {
    pub id: u64,
}

/// Outcome of the create-invitation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteOutcome {
    #[serde(rename = "status", alias = "httpStatus")]
    pub http_status: u16,
    pub message: String,
    pub invitation_id: Option<u64>,
}

impl InviteOutcome {
    pub fn created(invitation_id: u64) -> Self {
        Self {
            http_status: 201,
            message: "Invitation created".to_string(),
            invitation_id: Some(invitation_id),
        }
    }

    pub fn already_collaborator() -> Self {
        Self {
            http_status: 204,
            message: "User is already a collaborator".to_string(),
            invitation_id: None,
        }
    }

    pub fn failed(http_status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status,
            message: message.into(),
            invitation_id: None,
        }
    }
}

/// Coarse category of the first failure in a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Transient,
    Rejected,
    Service,
}

/// Complete record of one reconcile call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<ReconcileRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found_invitations: Option<Vec<Invitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_invitations: Option<Vec<DeletedInvitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite: Option<InviteOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl ReconcileResult {
    /// Request rejected before any call to the hosting service.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::rejected(ReconcileError::Validation(message.into()))
    }

    /// Result for a request that never got past validation.
    pub fn rejected(error: ReconcileError) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            input: None,
            found_invitations: None,
            deleted_invitations: None,
            invite: None,
            dry_run: None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }
}
