//! Derived workflow state
//!
//! [`derive_workflow_state`] resolves, once per load, what the acting
//! identity is looking at and what it may do. The result is never stored;
//! callers recompute it after every mutation.

use crate::chain_evaluator::{ChainEvaluator, ChainPosition};
use crate::config::WorkflowPolicy;
use crate::reopen::ReopenPolicy;
use crate::review::ReviewEscalation;
use approval_types::{
    ApprovalAction, Document, DocumentStatus, OrgDirectory, Role, SessionContext,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The mode a document is presented in for one identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "context", rename_all = "snake_case")]
pub enum WorkflowContext {
    /// Unsaved draft
    Create,
    /// Publisher editing while the chain runs
    Edit,
    /// Publisher working a revision request
    Revision,
    /// Anyone else viewing a document under revision
    RevisionInfo,
    /// Holder of the current chain entry
    ApprovalFeedback { index: usize },
    /// Reviewer asked for input on the entry at `index`
    ReviewReply { index: usize },
    /// Recipient side while AWAITING_RECIPIENT
    RecipientFeedback,
    /// DONE and reopenable by this identity
    ReopenableDone,
    /// REJECTED, or DONE outside the caller's reach
    Terminal,
    ReadOnly,
}

/// Operations the acting identity may submit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Create,
    Edit,
    FinishRevision,
    Approve,
    RequestRevision,
    Reject,
    Delegate,
    RequestReview,
    ReplyForReview,
    RecipientDone,
    RecipientRevision,
    RecipientReject,
    UpdateLineItems,
    SplitLine,
    BulkAssign,
    Reopen,
}

/// The pending review, if any
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    pub line_number: u32,
    pub mentions: Vec<String>,
    pub answered: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub context: WorkflowContext,
    pub role: Option<Role>,
    pub position: ChainPosition,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewState>,
    pub actions: Vec<WorkflowAction>,
}

impl WorkflowState {
    pub fn allows(&self, action: WorkflowAction) -> bool {
        self.actions.contains(&action)
    }
}

/// Resolve the workflow state of `doc` for the session's acting identity.
pub fn derive_workflow_state(
    doc: &Document,
    session: &SessionContext,
    directory: &OrgDirectory,
    policy: &WorkflowPolicy,
    now: DateTime<Utc>,
) -> WorkflowState {
    let identity = session.acting();
    let evaluation = ChainEvaluator::new().evaluate(doc, identity, directory);
    let role = evaluation.role;
    let review_rules = ReviewEscalation::new(policy.qualifying_seniority);

    let review = doc.reviewing_entry().map(|entry| ReviewState {
        line_number: entry.line_number,
        mentions: doc
            .latest_review_request()
            .map(|n| n.mentions.clone())
            .unwrap_or_default(),
        answered: doc.review_answered(),
    });

    let is_publisher = &doc.originator == identity;
    let mut actions = Vec::new();

    let context = if doc.number.is_none() {
        if is_publisher {
            actions.push(WorkflowAction::Create);
        }
        WorkflowContext::Create
    } else {
        match doc.status {
            DocumentStatus::Unpublished => match evaluation.position {
                ChainPosition::Current { index, .. }
                    if role.is_some_and(|r| r.is_chain_actor()) =>
                {
                    actions.extend([
                        WorkflowAction::Approve,
                        WorkflowAction::RequestRevision,
                        WorkflowAction::Reject,
                    ]);
                    let reviewing = doc.approval_chain[index].action == ApprovalAction::RequestingReview;
                    if role == Some(Role::Approver) && !reviewing {
                        actions.push(WorkflowAction::Delegate);
                    }
                    if review.is_none() {
                        actions.push(WorkflowAction::RequestReview);
                    }
                    WorkflowContext::ApprovalFeedback { index }
                }
                ChainPosition::Current { index, .. }
                    if review_rules.can_reply(doc, identity, directory) =>
                {
                    actions.push(WorkflowAction::ReplyForReview);
                    WorkflowContext::ReviewReply { index }
                }
                _ if is_publisher => {
                    actions.push(WorkflowAction::Edit);
                    WorkflowContext::Edit
                }
                _ => WorkflowContext::ReadOnly,
            },
            DocumentStatus::Revision if is_publisher => {
                actions.push(WorkflowAction::FinishRevision);
                WorkflowContext::Revision
            }
            DocumentStatus::Revision => WorkflowContext::RevisionInfo,
            DocumentStatus::AwaitingRecipient => match role {
                Some(Role::Recipient) => {
                    actions.extend([
                        WorkflowAction::UpdateLineItems,
                        WorkflowAction::SplitLine,
                        WorkflowAction::BulkAssign,
                    ]);
                    if doc.all_items_done() {
                        actions.push(WorkflowAction::RecipientDone);
                    }
                    if doc.reopen_count == 0 {
                        if doc.any_item_waiting() {
                            actions.push(WorkflowAction::RecipientRevision);
                        }
                        if !doc.any_item_done() {
                            actions.push(WorkflowAction::RecipientReject);
                        }
                    }
                    WorkflowContext::RecipientFeedback
                }
                Some(Role::RecipientDelegate) => {
                    actions.push(WorkflowAction::UpdateLineItems);
                    WorkflowContext::RecipientFeedback
                }
                _ => WorkflowContext::ReadOnly,
            },
            DocumentStatus::Done => {
                let reopen = ReopenPolicy::new(policy.reopen_window);
                if reopen.can_reopen(doc, identity, directory, now) {
                    actions.push(WorkflowAction::Reopen);
                    WorkflowContext::ReopenableDone
                } else {
                    WorkflowContext::Terminal
                }
            }
            DocumentStatus::Rejected => WorkflowContext::Terminal,
        }
    };

    tracing::debug!(
        document = %doc.label(),
        identity = %identity,
        context = ?context,
        actions = actions.len(),
        "Workflow state derived"
    );

    WorkflowState {
        context,
        role,
        position: evaluation.position,
        status: doc.status,
        review,
        actions,
    }
}
