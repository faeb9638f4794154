// Re-invite endpoint
//
// The form posts `{owner, repo, username, permission, dryRun}` here and renders
// whatever comes back, so every answer (including bad JSON) is a
// `ReconcileResult`.

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::ErrorCode;
use crate::reconcile::{ReconcileInput, ReconcileResult};
use crate::AppState;

/// Reconcile a student's invitation
///
/// POST /api/reinvite
pub async fn reinvite(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReconcileInput>, JsonRejection>,
) -> (StatusCode, Json<ReconcileResult>) {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected re-invite request body");
            let result = ReconcileResult::invalid(format!("Invalid request body: {}", rejection.body_text()));
            return (StatusCode::BAD_REQUEST, Json(result));
        }
    };

    let request_id = Uuid::new_v4();
    let result = state
        .reconciler
        .reconcile_input(input)
        .instrument(info_span!("reinvite", %request_id))
        .await;

    match (&result.error, result.error_kind) {
        (Some(error), Some(kind)) => warn!(kind = ?kind, error = %error, "Re-invite failed"),
        _ => info!(
            found = result.found_invitations.as_ref().map(Vec::len).unwrap_or(0),
            deleted = result.deleted_invitations.as_ref().map(Vec::len).unwrap_or(0),
            dry_run = result.is_dry_run(),
            "Re-invite completed"
        ),
    }

    (result_status(&result), Json(result))
}

/// HTTP status for a reconcile result; the body is the same either way.
pub fn result_status(result: &ReconcileResult) -> StatusCode {
    if result.ok {
        return StatusCode::OK;
    }
    result
        .error_kind
        .map(|kind| ErrorCode::for_reconcile(kind).status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::ErrorKind;

    #[test]
    fn test_result_status() {
        let mut result = ReconcileResult::invalid("Username is required");
        assert_eq!(result_status(&result), StatusCode::BAD_REQUEST);

        result.error_kind = Some(ErrorKind::NotFound);
        assert_eq!(result_status(&result), StatusCode::BAD_GATEWAY);

        result.ok = true;
        assert_eq!(result_status(&result), StatusCode::OK);
    }
}
