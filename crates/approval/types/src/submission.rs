//! Submission payloads: what a caller asks the workflow to do
//!
//! Each submission is applied atomically to a Document. Both the local
//! pre-submit validation and the backing store consume these same values.

use crate::{ApprovalAction, ApproverCode, Attachment, Document, IdentityId, LineItem, Role};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Approval Feedback ────────────────────────────────────────────────

/// Terminal actions an approver can take on the current entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackAction {
    Approve,
    Revision,
    Reject,
}

impl From<FeedbackAction> for ApprovalAction {
    fn from(action: FeedbackAction) -> Self {
        match action {
            FeedbackAction::Approve => ApprovalAction::Approve,
            FeedbackAction::Revision => ApprovalAction::Revision,
            FeedbackAction::Reject => ApprovalAction::Reject,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub action: FeedbackAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Proceed although mentioned reviewers have not answered
    #[serde(default)]
    pub ignore_mentioned: bool,
}

impl Feedback {
    pub fn approve() -> Self {
        Self::new(FeedbackAction::Approve)
    }

    pub fn revision(comment: impl Into<String>) -> Self {
        Self::new(FeedbackAction::Revision).with_comment(comment)
    }

    pub fn reject(comment: impl Into<String>) -> Self {
        Self::new(FeedbackAction::Reject).with_comment(comment)
    }

    pub fn new(action: FeedbackAction) -> Self {
        Self {
            action,
            comment: None,
            attachment: None,
            ignore_mentioned: false,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn ignoring_mentioned(mut self) -> Self {
        self.ignore_mentioned = true;
        self
    }
}

/// Opens a review escalation on the current entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub mentions: Vec<String>,
    pub comment: String,
    /// Operator confirmed appending unlisted mentions to the chain
    #[serde(default)]
    pub confirm_append: bool,
}

impl ReviewRequest {
    pub fn new<I, S>(mentions: I, comment: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mentions: mentions.into_iter().map(Into::into).collect(),
            comment: comment.into(),
            confirm_append: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirm_append = true;
        self
    }
}

/// Everything that can be submitted against a chain entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalSubmission {
    Feedback(Feedback),
    Delegate { delegate: IdentityId },
    RequestReview(ReviewRequest),
}

// ── Recipient Feedback ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientDecision {
    Done,
    Revision,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientFeedback {
    pub decision: RecipientDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl RecipientFeedback {
    pub fn new(decision: RecipientDecision) -> Self {
        Self {
            decision,
            comment: None,
            attachment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// ── Publisher Edits ──────────────────────────────────────────────────

/// The full replacement of publisher-owned content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEdit {
    pub title: String,
    pub recipient: ApproverCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl DocumentEdit {
    /// Start from the document's current content.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            title: doc.title.clone(),
            recipient: doc.recipient.clone(),
            attachment: doc.attachment.clone(),
            line_items: doc.line_items.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSubmission {
    pub edit: DocumentEdit,
    /// Publisher confirmed the requested revision is complete
    #[serde(default)]
    pub done_revising: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ── Line Items ───────────────────────────────────────────────────────

/// Values written to every currently unassigned line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignment {
    pub assignee: IdentityId,
    pub target_date: NaiveDate,
    pub status: crate::LineItemStatus,
    /// Restrict to these lines; all lines when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<u32>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineItemUpdate {
    Replace { line_items: Vec<LineItem> },
    Split { line_number: u32 },
    BulkAssign(BulkAssignment),
}

// ── Submission ───────────────────────────────────────────────────────

/// A single atomic operation on an existing document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Submission {
    Revise(RevisionSubmission),
    Approval {
        line_number: u32,
        submission: ApprovalSubmission,
    },
    ReplyForReview {
        text: String,
    },
    LineItems(LineItemUpdate),
    RecipientFeedback {
        feedback: RecipientFeedback,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_items: Option<Vec<LineItem>>,
    },
    Reopen {
        acting_role: Role,
    },
}

impl Submission {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Submission::Revise(_) => "revise",
            Submission::Approval {
                submission: ApprovalSubmission::Feedback(_),
                ..
            } => "approval_feedback",
            Submission::Approval {
                submission: ApprovalSubmission::Delegate { .. },
                ..
            } => "delegate",
            Submission::Approval {
                submission: ApprovalSubmission::RequestReview(_),
                ..
            } => "request_review",
            Submission::ReplyForReview { .. } => "reply_for_review",
            Submission::LineItems(_) => "line_items",
            Submission::RecipientFeedback { .. } => "recipient_feedback",
            Submission::Reopen { .. } => "reopen",
        }
    }
}
