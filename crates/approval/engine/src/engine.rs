//! Workflow engine facade
//!
//! Single entry point for every rule in this crate. Each submission is
//! applied to a copy of the document and the copy is returned only when
//! every check passed, so a rejected submission never leaves a partially
//! updated aggregate behind.

use crate::actor::Actor;
use crate::config::WorkflowPolicy;
use crate::job_registration::JobRegistration;
use crate::reopen::ReopenPolicy;
use crate::review::ReviewEscalation;
use crate::transition::TransitionEngine;
use crate::workflow_state::{derive_workflow_state, WorkflowState};
use approval_types::*;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug)]
pub struct WorkflowEngine {
    policy: WorkflowPolicy,
    transitions: TransitionEngine,
    review: ReviewEscalation,
    jobs: JobRegistration,
    reopen: ReopenPolicy,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(WorkflowPolicy::default())
    }
}

impl WorkflowEngine {
    pub fn new(policy: WorkflowPolicy) -> Self {
        Self {
            policy,
            transitions: TransitionEngine::new(),
            review: ReviewEscalation::new(policy.qualifying_seniority),
            jobs: JobRegistration::new(),
            reopen: ReopenPolicy::new(policy.reopen_window),
        }
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// Validate a draft and prepare it for its first save.
    pub fn create(&self, draft: &Document, actor: &Actor, now: DateTime<Utc>) -> WorkflowResult<Document> {
        let mut doc = draft.clone();
        self.transitions
            .create(&mut doc, actor, now)
            .inspect_err(|err| self.log_rejection(draft, actor, "create", err))?;
        Ok(doc)
    }

    /// Apply one submission atomically and return the resulting document.
    pub fn apply(
        &self,
        doc: &Document,
        actor: &Actor,
        submission: &Submission,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Document> {
        let mut next = doc.clone();
        self.dispatch(&mut next, actor, submission, now)
            .inspect_err(|err| self.log_rejection(doc, actor, submission.name(), err))?;

        tracing::debug!(
            document = %next.label(),
            op = submission.name(),
            status = %next.status,
            "Submission applied"
        );
        Ok(next)
    }

    pub fn derive_state(
        &self,
        doc: &Document,
        session: &SessionContext,
        directory: &OrgDirectory,
        now: DateTime<Utc>,
    ) -> WorkflowState {
        derive_workflow_state(doc, session, directory, &self.policy, now)
    }

    fn dispatch(
        &self,
        doc: &mut Document,
        actor: &Actor,
        submission: &Submission,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        match submission {
            Submission::Revise(revision) => match doc.status {
                DocumentStatus::Revision => self.transitions.finish_revision(doc, actor, revision, now),
                _ => self.transitions.edit(doc, actor, revision, now),
            },
            Submission::Approval {
                line_number,
                submission,
            } => match submission {
                ApprovalSubmission::Feedback(feedback) => {
                    self.transitions
                        .submit_feedback(doc, actor, *line_number, feedback, now)
                }
                ApprovalSubmission::Delegate { delegate } => {
                    self.transitions.delegate(doc, actor, *line_number, delegate, now)
                }
                ApprovalSubmission::RequestReview(request) => {
                    self.review.request_review(doc, actor, *line_number, request, now)
                }
            },
            Submission::ReplyForReview { text } => self.review.reply(doc, actor, text, now),
            Submission::LineItems(update) => match update {
                LineItemUpdate::Replace { line_items } => self
                    .jobs
                    .update_line_items(doc, actor, line_items, now)
                    .map(|_| ()),
                LineItemUpdate::Split { line_number } => {
                    self.jobs.split_line(doc, actor, *line_number, now).map(|_| ())
                }
                LineItemUpdate::BulkAssign(assignment) => {
                    self.jobs.bulk_assign(doc, actor, assignment, now).map(|_| ())
                }
            },
            Submission::RecipientFeedback {
                feedback,
                line_items,
            } => {
                if let Some(items) = line_items {
                    self.jobs.update_line_items(doc, actor, items, now)?;
                }
                self.transitions.recipient_feedback(doc, actor, feedback, now)
            }
            Submission::Reopen { acting_role } => {
                let identity = actor.identity();
                self.reopen
                    .check(doc, identity, actor.directory, *acting_role, now)?;
                self.reopen.apply(doc, identity, now);
                tracing::info!(
                    document = %doc.label(),
                    acting_role = %acting_role,
                    status = %doc.status,
                    reopen_count = doc.reopen_count,
                    "Document reopened"
                );
                Ok(())
            }
        }
    }

    fn log_rejection(&self, doc: &Document, actor: &Actor, op: &str, err: &WorkflowError) {
        tracing::warn!(
            document = %doc.label(),
            identity = %actor.identity(),
            op,
            error = %err,
            "Submission rejected"
        );
    }
}
