// Organization and assignment lookup
//
// Exposes the configured classroom table so a form can offer the right
// choices, and turns a selection into the student's repository.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::config::OrganizationConfig;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrganizationInfo {
    pub key: String,
    pub name: String,
    pub owner: String,
    pub assignments: Vec<AssignmentInfo>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentInfo {
    pub name: String,
    pub prefix: String,
}

impl From<(&String, &OrganizationConfig)> for OrganizationInfo {
    fn from((key, org): (&String, &OrganizationConfig)) -> Self {
        Self {
            key: key.clone(),
            name: org.name.clone(),
            owner: org.owner.clone(),
            assignments: org
                .assignments
                .iter()
                .map(|a| AssignmentInfo {
                    name: a.name.clone(),
                    prefix: a.prefix.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListOrganizationsResponse {
    pub organizations: Vec<OrganizationInfo>,
    pub total: usize,
}

/// List configured organizations
///
/// GET /api/organizations
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
) -> Json<ListOrganizationsResponse> {
    let organizations: Vec<OrganizationInfo> = state
        .config
        .organizations
        .iter()
        .map(OrganizationInfo::from)
        .collect();
    let total = organizations.len();

    Json(ListOrganizationsResponse {
        organizations,
        total,
    })
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub assignment: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub owner: String,
    pub repo: String,
    pub html_url: String,
}

/// Resolve an assignment selection into a repository
///
/// POST /api/resolve
pub async fn resolve_repository(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if req.organization.trim().is_empty() {
        errors.add("organization", "Organization is required");
    }
    if req.assignment.trim().is_empty() {
        errors.add("assignment", "Assignment is required");
    }
    if req.username.trim().is_empty() {
        errors.add("username", "Username is required");
    }
    errors.finish()?;

    let (owner, repo) =
        state
            .config
            .resolve_target(req.organization.trim(), &req.assignment, &req.username)?;

    Ok(Json(ResolveResponse {
        html_url: format!("https://github.com/{}/{}", owner, repo),
        owner,
        repo,
    }))
}
