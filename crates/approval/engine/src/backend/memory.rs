//! In-memory backend implementation

use super::notify::derive_notifications;
use super::traits::*;
use crate::actor::Actor;
use crate::engine::WorkflowEngine;
use crate::error::{BackendError, BackendResult};
use approval_types::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// In-memory document store for development and testing
///
/// Runs the same [`WorkflowEngine`] as the controller, so every write is
/// re-validated against the stored state rather than the caller's copy.
pub struct InMemoryBackend {
    engine: WorkflowEngine,
    directory: Arc<OrgDirectory>,
    documents: Arc<RwLock<HashMap<DocumentNumber, Document>>>,
    notifications: Arc<RwLock<Vec<Notification>>>,
    ticket_sequence: AtomicU64,
    delivery_sequence: AtomicU64,
    injected: Mutex<VecDeque<BackendError>>,
    expired: RwLock<HashSet<IdentityId>>,
    revoked: RwLock<HashSet<IdentityId>>,
    calls: AtomicU64,
}

impl InMemoryBackend {
    pub fn new(engine: WorkflowEngine, directory: Arc<OrgDirectory>) -> Self {
        Self {
            engine,
            directory,
            documents: Arc::new(RwLock::new(HashMap::new())),
            notifications: Arc::new(RwLock::new(Vec::new())),
            ticket_sequence: AtomicU64::new(0),
            delivery_sequence: AtomicU64::new(0),
            injected: Mutex::new(VecDeque::new()),
            expired: RwLock::new(HashSet::new()),
            revoked: RwLock::new(HashSet::new()),
            calls: AtomicU64::new(0),
        }
    }

    // ── Test hooks ───────────────────────────────────────────────────

    /// Store a document as-is, bypassing the workflow rules.
    pub async fn insert_document(&self, document: Document) -> BackendResult<DocumentNumber> {
        let number = match &document.number {
            Some(number) => number.clone(),
            None => self.allocate(document.kind),
        };
        let mut document = document;
        document.number = Some(number.clone());
        self.documents.write().await.insert(number.clone(), document);
        Ok(number)
    }

    /// Fail the next call with `error`.
    pub async fn inject_failure(&self, error: BackendError) {
        self.injected.lock().await.push_back(error);
    }

    /// Mark the principal's session as expired until it is refreshed.
    pub async fn expire_session(&self, principal: &IdentityId) {
        self.expired.write().await.insert(principal.clone());
    }

    /// Refuse every further call from the principal.
    pub async fn revoke(&self, principal: &IdentityId) {
        self.revoked.write().await.insert(principal.clone());
    }

    /// Number of calls received, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self, number: &DocumentNumber) -> Option<Document> {
        self.documents.read().await.get(number).cloned()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn allocate(&self, kind: DocumentKind) -> DocumentNumber {
        let sequence = match kind {
            DocumentKind::Ticket => &self.ticket_sequence,
            DocumentKind::DeliveryNote => &self.delivery_sequence,
        };
        let next = sequence.fetch_add(1, Ordering::SeqCst) + 1;
        DocumentNumber::new(format!("{}-{:06}", kind.number_prefix(), next))
    }

    /// Transport checks every call goes through first.
    async fn gate(&self, session: &SessionContext) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.injected.lock().await.pop_front() {
            return Err(error);
        }
        if self.revoked.read().await.contains(&session.principal) {
            return Err(BackendError::Unauthorized(format!(
                "{} is not authorised",
                session.principal
            )));
        }
        if self.expired.read().await.contains(&session.principal) {
            return Err(BackendError::SessionExpired);
        }
        Ok(())
    }

    /// Re-validate and store one submission against the stored document.
    async fn apply(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        submission: Submission,
    ) -> BackendResult<()> {
        self.gate(session).await?;

        let mut documents = self.documents.write().await;
        let current = documents
            .get(number)
            .ok_or_else(|| BackendError::NotFound(number.clone()))?;

        let actor = Actor::new(session, &self.directory);
        let next = self
            .engine
            .apply(current, &actor, &submission, Utc::now())?;

        let raised = derive_notifications(number, Some(current), &next, &self.directory);
        documents.insert(number.clone(), next);
        drop(documents);

        self.notifications.write().await.extend(raised);

        tracing::info!(
            document = %number,
            op = submission.name(),
            identity = %session.acting(),
            "Submission stored"
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn fetch(&self, session: &SessionContext, number: &DocumentNumber) -> BackendResult<Document> {
        self.gate(session).await?;
        self.documents
            .read()
            .await
            .get(number)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(number.clone()))
    }

    async fn create(&self, session: &SessionContext, document: Document) -> BackendResult<DocumentNumber> {
        self.gate(session).await?;

        let actor = Actor::new(session, &self.directory);
        let mut created = self.engine.create(&document, &actor, Utc::now())?;
        let number = self.allocate(created.kind);
        created.number = Some(number.clone());

        let raised = derive_notifications(&number, None, &created, &self.directory);
        self.documents.write().await.insert(number.clone(), created);
        self.notifications.write().await.extend(raised);

        tracing::info!(document = %number, identity = %session.acting(), "Document created");
        Ok(number)
    }

    async fn revise_document(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        revision: RevisionSubmission,
    ) -> BackendResult<()> {
        self.apply(session, number, Submission::Revise(revision)).await
    }

    async fn submit_approval_feedback(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        line_number: u32,
        submission: ApprovalSubmission,
    ) -> BackendResult<()> {
        self.apply(
            session,
            number,
            Submission::Approval {
                line_number,
                submission,
            },
        )
        .await
    }

    async fn reply_for_review(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        text: String,
    ) -> BackendResult<()> {
        self.apply(session, number, Submission::ReplyForReview { text }).await
    }

    async fn update_line_items(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        update: LineItemUpdate,
    ) -> BackendResult<()> {
        self.apply(session, number, Submission::LineItems(update)).await
    }

    async fn submit_feedback_and_line_items(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        feedback: RecipientFeedback,
        line_items: Option<Vec<LineItem>>,
    ) -> BackendResult<()> {
        self.apply(
            session,
            number,
            Submission::RecipientFeedback {
                feedback,
                line_items,
            },
        )
        .await
    }

    async fn reopen(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
        acting_role: Role,
    ) -> BackendResult<()> {
        self.apply(session, number, Submission::Reopen { acting_role }).await
    }

    async fn list_notifications(&self, session: &SessionContext) -> BackendResult<Vec<Notification>> {
        self.gate(session).await?;
        let identity = session.acting();
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| self.directory.names(&n.addressee, identity))
            .cloned()
            .collect())
    }

    async fn delete_notification(
        &self,
        session: &SessionContext,
        number: &DocumentNumber,
    ) -> BackendResult<usize> {
        self.gate(session).await?;
        let identity = session.acting();
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications
            .retain(|n| !(&n.document == number && self.directory.names(&n.addressee, identity)));
        Ok(before - notifications.len())
    }
}

#[async_trait]
impl SessionRefresher for InMemoryBackend {
    async fn refresh(&self, session: &SessionContext) -> BackendResult<()> {
        if self.revoked.read().await.contains(&session.principal) {
            return Err(BackendError::Unauthorized(format!(
                "{} cannot refresh",
                session.principal
            )));
        }
        self.expired.write().await.remove(&session.principal);
        tracing::debug!(principal = %session.principal, "Session refreshed");
        Ok(())
    }
}
