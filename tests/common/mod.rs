//! Shared helpers for tests running against a mock GitHub server.

#![allow(dead_code)]

use reinvite::config::GitHubConfig;
use reinvite::github::GitHubClient;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const OWNER: &str = "McMasterQM";
pub const REPO: &str = "easy-moments-octocat";
pub const TOKEN: &str = "ghp_test_token";

pub fn github_config(server: &MockServer) -> GitHubConfig {
    GitHubConfig {
        api_url: server.uri(),
        token: Some(TOKEN.to_string()),
        ..GitHubConfig::default()
    }
}

pub fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::from_config(&github_config(server)).unwrap()
}

pub fn invitations_path() -> String {
    format!("/repos/{}/{}/invitations", OWNER, REPO)
}

pub fn invitation_path(id: u64) -> String {
    format!("/repos/{}/{}/invitations/{}", OWNER, REPO, id)
}

pub fn collaborator_path(username: &str) -> String {
    format!("/repos/{}/{}/collaborators/{}", OWNER, REPO, username)
}

/// Invitation object the way GitHub returns it.
pub fn invitation(id: u64, login: &str) -> Value {
    json!({
        "id": id,
        "repository": {"name": REPO, "full_name": format!("{}/{}", OWNER, REPO)},
        "invitee": {"login": login, "id": id + 10_000, "type": "User"},
        "inviter": {"login": "instructor", "id": 1, "type": "User"},
        "permissions": "write",
        "created_at": "2026-01-12T15:04:05Z",
        "expired": false,
        "url": format!("https://api.github.com/user/repository_invitations/{}", id),
        "html_url": format!("https://github.com/{}/{}/invitations", OWNER, REPO)
    })
}
