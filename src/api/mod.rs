pub mod error;
pub mod metrics;
mod organizations;
mod reinvite;

pub use reinvite::result_status;

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/reinvite", post(reinvite::reinvite))
        .route("/organizations", get(organizations::list_organizations))
        .route("/resolve", post(organizations::resolve_repository));

    // The form is served from its own origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::github::{CreateOutcome, DeleteOutcome, GitHubError, InvitationService};
    use crate::reconcile::{Invitation, PermissionLevel, Reconciler};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct StaticGitHub;

    #[async_trait]
    impl InvitationService for StaticGitHub {
        async fn list_invitations(&self, _: &str, repo: &str) -> Result<Vec<Invitation>, GitHubError> {
            if repo == "missing-repo" {
                return Err(GitHubError::NotFound {
                    message: "Not Found".to_string(),
                });
            }
            Ok(vec![Invitation {
                id: 77,
                invitee_login: Some("Octocat".to_string()),
                permissions: Some("write".to_string()),
            }])
        }

        async fn delete_invitation(&self, _: &str, _: &str, _: u64) -> Result<DeleteOutcome, GitHubError> {
            Ok(DeleteOutcome::Deleted)
        }

        async fn create_invitation(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: PermissionLevel,
        ) -> Result<CreateOutcome, GitHubError> {
            Ok(CreateOutcome::Created { invitation_id: 78 })
        }
    }

    fn app() -> Router {
        let state = AppState::new(Config::default(), Reconciler::new(Arc::new(StaticGitHub)));
        create_router(Arc::new(state))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reinvite_endpoint() {
        let (status, json) = post_json(
            app(),
            "/api/reinvite",
            r#"{"owner":"McMasterQM","repo":"easy-moments-octocat","username":"octocat","permission":"push","dryRun":false}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["foundInvitations"][0]["inviteeLogin"], "Octocat");
        assert_eq!(json["deletedInvitations"][0]["id"], 77);
        assert_eq!(json["invite"]["invitationId"], 78);
        assert_eq!(json["invite"]["status"], 201);
        assert_eq!(json["dryRun"], false);
    }

    #[tokio::test]
    async fn test_reinvite_requires_username() {
        let (status, json) = post_json(
            app(),
            "/api/reinvite",
            r#"{"owner":"McMasterQM","repo":"easy-moments-","username":"","permission":"push"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "Username is required");
    }

    #[tokio::test]
    async fn test_reinvite_bad_json_is_a_result() {
        let (status, json) = post_json(app(), "/api/reinvite", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_reinvite_missing_repo_is_bad_gateway() {
        let (status, json) = post_json(
            app(),
            "/api/reinvite",
            r#"{"owner":"McMasterQM","repo":"missing-repo","username":"octocat","permission":"pull"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["errorKind"], "not_found");
    }

    #[tokio::test]
    async fn test_list_organizations() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/organizations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["organizations"][0]["owner"], "McMasterQM");
        assert_eq!(
            json["organizations"][0]["assignments"][0]["name"],
            "🧑GitHub Fundamentals"
        );
        assert_eq!(json["organizations"][0]["assignments"][1]["prefix"], "easy-moments");
    }

    #[tokio::test]
    async fn test_resolve_repository() {
        let (status, json) = post_json(
            app(),
            "/api/resolve",
            r#"{"organization":"McMasterQM","assignment":"Easy Moments","username":"octocat"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["repo"], "easy-moments-octocat");
        assert_eq!(json["html_url"], "https://github.com/McMasterQM/easy-moments-octocat");

        let (status, json) = post_json(
            app(),
            "/api/resolve",
            r#"{"organization":"Nowhere","assignment":"Easy Moments","username":"octocat"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");

        let (status, json) = post_json(app(), "/api/resolve", r#"{"organization":"McMasterQM"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }
}
