//! Workflow controller
//!
//! The only surface a UI talks to. Every operation follows the same
//! sequence:
//!
//! 1. fetch the current document from the backend
//! 2. derive the workflow state for the acting identity
//! 3. validate the submission locally against that document
//! 4. send it once through the session-retry wrapper
//! 5. fetch again and return the refreshed document with its state
//!
//! Local rejections never reach the backend. Backend failures are mapped
//! to [`ControllerError`] and never panic.

use crate::actor::Actor;
use crate::backend::{DocumentBackend, SessionRefresher};
use crate::engine::WorkflowEngine;
use crate::error::{BackendResult, ControllerError, ControllerResult};
use crate::retry::with_session_retry;
use crate::workflow_state::WorkflowState;
use approval_types::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// A document together with the state derived for the caller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loaded {
    pub document: Document,
    pub state: WorkflowState,
}

pub struct WorkflowController {
    engine: WorkflowEngine,
    directory: Arc<OrgDirectory>,
    backend: Arc<dyn DocumentBackend>,
    refresher: Arc<dyn SessionRefresher>,
}

impl WorkflowController {
    pub fn new(
        engine: WorkflowEngine,
        directory: Arc<OrgDirectory>,
        backend: Arc<dyn DocumentBackend>,
        refresher: Arc<dyn SessionRefresher>,
    ) -> Self {
        Self {
            engine,
            directory,
            backend,
            refresher,
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    // ── Loading ──────────────────────────────────────────────────────

    pub async fn load(&self, session: &SessionContext, number: &DocumentNumber) -> ControllerResult<Loaded> {
        let backend = &self.backend;
        let document = self
            .call(session, "fetch", move || backend.fetch(session, number))
            .await?;
        let state = self
            .engine
            .derive_state(&document, session, &self.directory, Utc::now());
        Ok(Loaded { document, state })
    }

    // ── Publisher ────────────────────────────────────────────────────

    pub async fn create(
        &self,
        session: &SessionContext,
        draft: Document,
        attachment: Option<AttachmentUpload>,
    ) -> ControllerResult<Loaded> {
        let mut draft = draft;
        if let Some(upload) = attachment {
            draft.attachment = Some(upload.to_attachment());
        }

        let actor = Actor::new(session, &self.directory);
        self.engine.create(&draft, &actor, Utc::now())?;

        let backend = &self.backend;
        let payload = &draft;
        let number = self
            .call(session, "create", move || backend.create(session, payload.clone()))
            .await?;

        tracing::info!(document = %number, identity = %session.acting(), "Document submitted");
        self.load(session, &number).await
    }

    /// Publisher edit while the chain runs.
    pub async fn edit(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        revision: RevisionSubmission,
        attachment: Option<AttachmentUpload>,
    ) -> ControllerResult<Loaded> {
        self.revise(session, number, revision, attachment, DocumentStatus::Unpublished)
            .await
    }

    /// Publisher resubmits after a revision request.
    pub async fn finish_revision(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        revision: RevisionSubmission,
        attachment: Option<AttachmentUpload>,
    ) -> ControllerResult<Loaded> {
        self.revise(session, number, revision, attachment, DocumentStatus::Revision)
            .await
    }

    async fn revise(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        revision: RevisionSubmission,
        attachment: Option<AttachmentUpload>,
        expected: DocumentStatus,
    ) -> ControllerResult<Loaded> {
        let mut revision = revision;
        if let Some(upload) = attachment {
            revision.edit.attachment = Some(upload.to_attachment());
        }

        let loaded = self.load(session, number).await?;
        if loaded.document.status != expected {
            return Err(WorkflowError::invalid_transition(
                loaded.document.status,
                format!("expected a {} document", expected),
            )
            .into());
        }

        let backend = &self.backend;
        let payload = revision.clone();
        self.submit_loaded(session, number, loaded, Submission::Revise(revision), move || {
            backend.revise_document(session, number, payload.clone())
        })
        .await
    }

    // ── Approval chain ───────────────────────────────────────────────

    pub async fn submit_approval(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
        feedback: Feedback,
    ) -> ControllerResult<Loaded> {
        self.approval(session, number, line_number, ApprovalSubmission::Feedback(feedback))
            .await
    }

    pub async fn delegate(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
        delegate: IdentityId,
    ) -> ControllerResult<Loaded> {
        self.approval(
            session,
            number,
            line_number,
            ApprovalSubmission::Delegate { delegate },
        )
        .await
    }

    pub async fn request_review(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
        request: ReviewRequest,
    ) -> ControllerResult<Loaded> {
        self.approval(
            session,
            number,
            line_number,
            ApprovalSubmission::RequestReview(request),
        )
        .await
    }

    async fn approval(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
        payload: ApprovalSubmission,
    ) -> ControllerResult<Loaded> {
        let backend = &self.backend;
        let submission = Submission::Approval {
            line_number,
            submission: payload.clone(),
        };
        self.submit(session, number, submission, move || {
            backend.submit_approval_feedback(session, number, line_number, payload.clone())
        })
        .await
    }

    pub async fn reply_for_review(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        text: String,
    ) -> ControllerResult<Loaded> {
        let backend = &self.backend;
        let submission = Submission::ReplyForReview { text: text.clone() };
        self.submit(session, number, submission, move || {
            backend.reply_for_review(session, number, text.clone())
        })
        .await
    }

    // ── Recipient ────────────────────────────────────────────────────

    pub async fn recipient_feedback(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        feedback: RecipientFeedback,
        line_items: Option<Vec<LineItem>>,
        attachment: Option<AttachmentUpload>,
    ) -> ControllerResult<Loaded> {
        let mut feedback = feedback;
        if let Some(upload) = attachment {
            feedback.attachment = Some(upload.to_attachment());
        }

        let backend = &self.backend;
        let submission = Submission::RecipientFeedback {
            feedback: feedback.clone(),
            line_items: line_items.clone(),
        };
        self.submit(session, number, submission, move || {
            backend.submit_feedback_and_line_items(
                session,
                number,
                feedback.clone(),
                line_items.clone(),
            )
        })
        .await
    }

    pub async fn update_line_items(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_items: Vec<LineItem>,
    ) -> ControllerResult<Loaded> {
        self.line_items(session, number, LineItemUpdate::Replace { line_items })
            .await
    }

    pub async fn split_line(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
    ) -> ControllerResult<Loaded> {
        self.line_items(session, number, LineItemUpdate::Split { line_number })
            .await
    }

    pub async fn bulk_assign(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        assignment: BulkAssignment,
    ) -> ControllerResult<Loaded> {
        self.line_items(session, number, LineItemUpdate::BulkAssign(assignment))
            .await
    }

    async fn line_items(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        update: LineItemUpdate,
    ) -> ControllerResult<Loaded> {
        let backend = &self.backend;
        let submission = Submission::LineItems(update.clone());
        self.submit(session, number, submission, move || {
            backend.update_line_items(session, number, update.clone())
        })
        .await
    }

    // ── Reopen ───────────────────────────────────────────────────────

    pub async fn reopen(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        acting_role: Role,
    ) -> ControllerResult<Loaded> {
        let backend = &self.backend;
        self.submit(session, number, Submission::Reopen { acting_role }, move || {
            backend.reopen(session, number, acting_role)
        })
        .await
    }

    // ── Notifications ────────────────────────────────────────────────

    pub async fn notifications(&self, session: &SessionContext) -> ControllerResult<Vec<Notification>> {
        let backend = &self.backend;
        self.call(session, "list_notifications", move || {
            backend.list_notifications(session)
        })
        .await
    }

    pub async fn dismiss_notification(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
    ) -> ControllerResult<usize> {
        let backend = &self.backend;
        self.call(session, "delete_notification", move || {
            backend.delete_notification(session, number)
        })
        .await
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    async fn submit<F, Fut>(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        submission: Submission,
        send: F,
    ) -> ControllerResult<Loaded>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<()>>,
    {
        let loaded = self.load(session, number).await?;
        self.submit_loaded(session, number, loaded, submission, send)
            .await
    }

    async fn submit_loaded<F, Fut>(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        loaded: Loaded,
        submission: Submission,
        send: F,
    ) -> ControllerResult<Loaded>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<()>>,
    {
        tracing::debug!(
            document = %number,
            op = submission.name(),
            context = ?loaded.state.context,
            role = ?loaded.state.role,
            "Validating submission"
        );

        let actor = Actor::new(session, &self.directory);
        self.engine
            .apply(&loaded.document, &actor, &submission, Utc::now())?;

        self.call(session, submission.name(), send).await?;
        self.load(session, number).await
    }

    async fn call<T, F, Fut>(&self, session: &SessionContext, op: &str, call: F) -> ControllerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        with_session_retry(self.refresher.as_ref(), session, op, call)
            .await
            .map_err(|err| {
                tracing::warn!(op, error = %err, "Backend call failed");
                ControllerError::from(err)
            })
    }
}
