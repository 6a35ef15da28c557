//! Backend trait definitions

use crate::error::BackendResult;
use approval_types::{
    ApprovalSubmission, Document, DocumentNumber, LineItem, LineItemUpdate, Notification,
    RecipientFeedback, RevisionSubmission, Role, SessionContext,
};
use async_trait::async_trait;

/// The document store the workflow controller talks to
///
/// Every call carries the caller's session. Implementations re-run the
/// workflow rules against their own current state and answer with a
/// [`crate::error::BackendError`] on refusal.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Get a document by number
    async fn fetch(&self, session: &SessionContext, number: &DocumentNumber) -> BackendResult<Document>;

    /// Store a new document and allocate its number
    async fn create(&self, session: &SessionContext, document: Document) -> BackendResult<DocumentNumber>;

    /// Replace publisher-owned content (edit or finished revision)
    async fn revise_document(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        revision: RevisionSubmission,
    ) -> BackendResult<()>;

    /// Feedback, delegation or review request on one chain entry
    async fn submit_approval_feedback(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
        submission: ApprovalSubmission,
    ) -> BackendResult<()>;

    async fn reply_for_review(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        text: String,
    ) -> BackendResult<()>;

    async fn update_line_items(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        update: LineItemUpdate,
    ) -> BackendResult<()>;

    /// Recipient feedback, optionally with line-item changes in the same write
    async fn submit_feedback_and_line_items(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        feedback: RecipientFeedback,
        line_items: Option<Vec<LineItem>>,
    ) -> BackendResult<()>;

    async fn reopen(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        acting_role: Role,
    ) -> BackendResult<()>;

    /// Notifications addressed to the session's acting identity
    async fn list_notifications(&self, session: &SessionContext) -> BackendResult<Vec<Notification>>;

    /// Remove the acting identity's notifications for a document
    async fn delete_notification(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
    ) -> BackendResult<usize>;
}

/// Session renewal used by the retry wrapper
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, session: &SessionContext) -> BackendResult<()>;
}
