//! Input validation for reconcile requests.
//!
//! The form already refuses an empty username, but requests reach us over an
//! untrusted boundary so everything is checked again before any network call.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::ReconcileError;
use super::types::{PermissionLevel, ReconcileInput, ReconcileRequest};

const USERNAME_REQUIRED: &str = "Username is required";

lazy_static! {
    /// GitHub logins: alphanumeric runs joined by single hyphens
    static ref LOGIN_REGEX: Regex = Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").unwrap();

    /// Repository names and organization logins as they appear in API paths
    static ref REPO_NAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
}

/// Validate a GitHub username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err(USERNAME_REQUIRED.to_string());
    }

    if username.len() > 39 {
        return Err("Username is too long (max 39 characters)".to_string());
    }

    if !LOGIN_REGEX.is_match(username) {
        return Err(format!(
            "Invalid GitHub username '{}': use letters, digits and single hyphens",
            username
        ));
    }

    Ok(())
}

/// Validate the repository owner (user or organization)
pub fn validate_owner(owner: &str) -> Result<(), String> {
    if owner.is_empty() {
        return Err("Owner is required".to_string());
    }

    if owner.len() > 39 || !REPO_NAME_REGEX.is_match(owner) {
        return Err(format!("Invalid repository owner '{}'", owner));
    }

    Ok(())
}

/// Validate a repository name
pub fn validate_repo(repo: &str) -> Result<(), String> {
    if repo.is_empty() {
        return Err("Repository is required".to_string());
    }

    if repo.len() > 100 {
        return Err("Repository name is too long (max 100 characters)".to_string());
    }

    if repo == "." || repo == ".." || !REPO_NAME_REGEX.is_match(repo) {
        return Err(format!("Invalid repository name '{}'", repo));
    }

    Ok(())
}

/// Check a typed request, returning it with surrounding whitespace removed.
///
/// A missing username is reported on its own; otherwise all problems are
/// reported together, username first.
pub fn validate_request(request: ReconcileRequest) -> Result<ReconcileRequest, ReconcileError> {
    let request = ReconcileRequest {
        owner: request.owner.trim().to_string(),
        repo: request.repo.trim().to_string(),
        username: request.username.trim().to_string(),
        ..request
    };

    // The form derives the repository from the username, so both go missing together
    if request.username.is_empty() {
        return Err(ReconcileError::Validation(USERNAME_REQUIRED.to_string()));
    }

    let errors: Vec<String> = [
        validate_username(&request.username),
        validate_owner(&request.owner),
        validate_repo(&request.repo),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    if errors.is_empty() {
        Ok(request)
    } else {
        Err(ReconcileError::Validation(errors.join("; ")))
    }
}

/// Turn untrusted input into a request. A missing permission means `push`,
/// an unrecognized one is an error.
pub fn parse_input(input: ReconcileInput) -> Result<ReconcileRequest, ReconcileError> {
    let username = input.username.unwrap_or_default();
    if username.trim().is_empty() {
        return Err(ReconcileError::Validation(USERNAME_REQUIRED.to_string()));
    }

    let permission = match input.permission.as_deref().map(str::trim) {
        None | Some("") => Ok(PermissionLevel::default()),
        Some(raw) => raw.parse::<PermissionLevel>(),
    };

    let request = ReconcileRequest {
        owner: input.owner.unwrap_or_default(),
        repo: input.repo.unwrap_or_default(),
        username,
        permission: permission.clone().unwrap_or_default(),
        dry_run: input.dry_run.unwrap_or(false),
    };

    match (validate_request(request), permission) {
        (Ok(request), Ok(_)) => Ok(request),
        (Ok(_), Err(perm_err)) => Err(ReconcileError::Validation(perm_err)),
        (Err(err), Ok(_)) => Err(err),
        (Err(err), Err(perm_err)) => Err(ReconcileError::Validation(format!("{}; {}", err, perm_err))),
    }
}
