//! Invitation reconciliation.
//!
//! Brings the pending invitations of one user on one repository back to a
//! single fresh invitation at the requested permission:
//!
//! 1. validate the request (no network on failure)
//! 2. list every pending invitation, following pagination
//! 3. keep the ones addressed to the user (case-insensitive)
//! 4. delete each of them independently
//! 5. invite the user again
//!
//! In dry-run mode only steps 1-3 run. The outcome is always a
//! [`ReconcileResult`]; nothing is raised to the caller.

mod error;
mod types;
pub mod validation;

pub use error::ReconcileError;
pub use types::{
    DeletedInvitation, ErrorKind, Invitation, InviteOutcome, PermissionLevel, ReconcileInput,
    ReconcileRequest, ReconcileResult,
};

use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::api::metrics;
use crate::github::{CreateOutcome, DeleteOutcome, InvitationService};

/// Runs reconcile requests against an invitation service.
#[derive(Clone)]
pub struct Reconciler {
    service: Arc<dyn InvitationService>,
}

impl Reconciler {
    pub fn new(service: Arc<dyn InvitationService>) -> Self {
        Self { service }
    }

    /// Parse untrusted input and reconcile it.
    pub async fn reconcile_input(&self, input: ReconcileInput) -> ReconcileResult {
        match validation::parse_input(input) {
            Ok(request) => self.reconcile(request).await,
            Err(err) => {
                metrics::record_reconcile("invalid");
                ReconcileResult::rejected(err)
            }
        }
    }

    pub async fn reconcile(&self, request: ReconcileRequest) -> ReconcileResult {
        let request = match validation::validate_request(request) {
            Ok(request) => request,
            Err(err) => {
                metrics::record_reconcile("invalid");
                return ReconcileResult::rejected(err);
            }
        };

        let span = info_span!(
            "reconcile",
            owner = %request.owner,
            repo = %request.repo,
            username = %request.username,
            dry_run = request.dry_run,
        );

        let result = self.run(request).instrument(span).await;
        metrics::record_reconcile(outcome_label(&result));
        result
    }

    async fn run(&self, request: ReconcileRequest) -> ReconcileResult {
        let mut report = Report::new(request);
        let req = &report.request;

        let listed = match self.service.list_invitations(&req.owner, &req.repo).await {
            Ok(listed) => listed,
            Err(err) => {
                warn!(error = %err, "Failed to list invitations");
                let step = format!("Failed to list invitations for {}", req.full_name());
                report.fail(ReconcileError::from_github(step, err));
                return report.finish();
            }
        };

        let total = listed.len();
        let found: Vec<Invitation> = listed
            .into_iter()
            .filter(|inv| inv.is_for(&req.username))
            .collect();
        info!(total, matched = found.len(), "Listed pending invitations");

        if req.dry_run {
            info!(
                would_delete = found.len(),
                permission = %req.permission,
                "Dry run, skipping delete and invite"
            );
            report.found = Some(found);
            return report.finish();
        }

        let mut deleted = Vec::with_capacity(found.len());
        let mut failures = Vec::new();
        for invitation in &found {
            match self
                .service
                .delete_invitation(&req.owner, &req.repo, invitation.id)
                .await
            {
                Ok(DeleteOutcome::Deleted) => {
                    info!(invitation_id = invitation.id, "Deleted stale invitation");
                    deleted.push(DeletedInvitation { id: invitation.id });
                }
                Ok(DeleteOutcome::AlreadyGone) => {
                    info!(invitation_id = invitation.id, "Invitation already gone");
                    deleted.push(DeletedInvitation { id: invitation.id });
                }
                Err(err) => {
                    warn!(invitation_id = invitation.id, error = %err, "Failed to delete invitation");
                    failures.push(ReconcileError::from_github(
                        format!("Failed to delete invitation {}", invitation.id),
                        err,
                    ));
                }
            }
        }
        metrics::record_invitations_deleted(deleted.len());

        let invite = match self
            .service
            .create_invitation(&req.owner, &req.repo, &req.username, req.permission)
            .await
        {
            Ok(CreateOutcome::Created { invitation_id }) => {
                info!(invitation_id, permission = %req.permission, "Invitation created");
                metrics::record_invitation_created();
                Some(InviteOutcome::created(invitation_id))
            }
            Ok(CreateOutcome::AlreadyCollaborator) => {
                info!("User is already a collaborator");
                Some(InviteOutcome::already_collaborator())
            }
            Err(err) => {
                warn!(error = %err, "Failed to create invitation");
                let outcome = err
                    .status()
                    .map(|status| InviteOutcome::failed(status, err.to_string()));
                failures.push(ReconcileError::from_github(
                    format!("Failed to invite {}", req.username),
                    err,
                ));
                outcome
            }
        };

        report.found = Some(found);
        report.deleted = Some(deleted);
        report.invite = invite;
        for failure in failures {
            report.fail(failure);
        }
        report.finish()
    }
}

/// Accumulates the outcome of each step; folded into a result at the end.
struct Report {
    request: ReconcileRequest,
    found: Option<Vec<Invitation>>,
    deleted: Option<Vec<DeletedInvitation>>,
    invite: Option<InviteOutcome>,
    failures: Vec<ReconcileError>,
}

impl Report {
    fn new(request: ReconcileRequest) -> Self {
        Self {
            request,
            found: None,
            deleted: None,
            invite: None,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, error: ReconcileError) {
        self.failures.push(error);
    }

    fn finish(self) -> ReconcileResult {
        let error = (!self.failures.is_empty()).then(|| {
            self.failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        });
        let dry_run = self.request.dry_run;

        ReconcileResult {
            ok: self.failures.is_empty(),
            error,
            error_kind: self.failures.first().map(ReconcileError::kind),
            input: Some(self.request),
            found_invitations: self.found,
            deleted_invitations: self.deleted,
            invite: self.invite,
            dry_run: Some(dry_run),
        }
    }
}

fn outcome_label(result: &ReconcileResult) -> &'static str {
    match (result.ok, result.is_dry_run()) {
        (true, true) => "dry_run",
        (true, false) => "success",
        (false, _) => "failed",
    }
}
