//! The Document aggregate
//!
//! A Document owns its approval chain, line items and note log by
//! composition. Status changes only through the transition engine.

use crate::{
    append_note, append_system_note, is_dense, ApprovalAction, ApprovalEntry, ApproverCode,
    Attachment, DocumentNumber, IdentityId, LineItem, LineItemStatus, Note, NoteKind,
    WorkflowError, WorkflowResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Kind and Status ──────────────────────────────────────────────────

/// The two document workflows sharing one approval design
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Service-request ticket; has a recipient feedback stage
    Ticket,
    /// Goods-delivery note; completes as soon as its chain clears
    DeliveryNote,
}

impl DocumentKind {
    /// The status a document enters once its approval chain clears.
    pub fn chain_cleared_status(&self) -> DocumentStatus {
        match self {
            DocumentKind::Ticket => DocumentStatus::AwaitingRecipient,
            DocumentKind::DeliveryNote => DocumentStatus::Done,
        }
    }

    pub fn has_recipient_stage(&self) -> bool {
        matches!(self, DocumentKind::Ticket)
    }

    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Ticket => "TKT",
            DocumentKind::DeliveryNote => "DN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Unpublished,
    AwaitingRecipient,
    Revision,
    Rejected,
    Done,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentStatus::Unpublished => "UNPUBLISHED",
            DocumentStatus::AwaitingRecipient => "AWAITING_RECIPIENT",
            DocumentStatus::Revision => "REVISION",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Done => "DONE",
        };
        write!(f, "{}", s)
    }
}

// ── Document ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Assigned by the backing store; `None` until created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<DocumentNumber>,
    pub kind: DocumentKind,
    pub title: String,
    /// The publisher
    pub originator: IdentityId,
    /// Department expected to carry out the work
    pub recipient: ApproverCode,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    /// When the chain cleared and the recipient took delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Status held just before completion; restored by reopen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_completion_status: Option<DocumentStatus>,
    #[serde(default)]
    pub reopen_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reopened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub approval_chain: Vec<ApprovalEntry>,
    #[serde(default)]
    pub note_log: Vec<Note>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Attachment supplied with the recipient's feedback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_attachment: Option<Attachment>,
}

impl Document {
    /// Start a new, unsaved document.
    pub fn draft(
        kind: DocumentKind,
        title: impl Into<String>,
        originator: IdentityId,
        recipient: ApproverCode,
    ) -> Self {
        Self {
            number: None,
            kind,
            title: title.into(),
            originator,
            recipient,
            status: DocumentStatus::Unpublished,
            created_at: Utc::now(),
            received_at: None,
            completed_at: None,
            pre_completion_status: None,
            reopen_count: 0,
            reopened_at: None,
            line_items: Vec::new(),
            approval_chain: Vec::new(),
            note_log: Vec::new(),
            attachment: None,
            recipient_attachment: None,
        }
    }

    /// Append an approver at the end of the chain.
    pub fn with_approver(mut self, code: impl Into<String>) -> Self {
        let line = self.approval_chain.len() as u32;
        self.approval_chain
            .push(ApprovalEntry::new(line, ApproverCode::new(code)));
        self
    }

    /// Append a line item, numbering it after the existing ones.
    pub fn with_line_item(mut self, description: impl Into<String>, quantity: u32) -> Self {
        let line = self.line_items.len() as u32;
        self.line_items
            .push(LineItem::new(line, description, quantity));
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// The store-assigned number, or an error for unsaved drafts.
    pub fn number(&self) -> WorkflowResult<&DocumentNumber> {
        self.number.as_ref().ok_or(WorkflowError::NotPersisted)
    }

    /// Display label used in logs.
    pub fn label(&self) -> String {
        match &self.number {
            Some(n) => n.to_string(),
            None => format!("draft:{}", self.title),
        }
    }

    // ── Chain queries ────────────────────────────────────────────────

    pub fn entry(&self, line_number: u32) -> Option<&ApprovalEntry> {
        self.approval_chain
            .iter()
            .find(|e| e.line_number == line_number)
    }

    pub fn entry_mut(&mut self, line_number: u32) -> WorkflowResult<&mut ApprovalEntry> {
        self.approval_chain
            .iter_mut()
            .find(|e| e.line_number == line_number)
            .ok_or(WorkflowError::EntryNotFound(line_number))
    }

    /// Whether at least one entry has approved.
    pub fn has_approval(&self) -> bool {
        self.approval_chain.iter().any(|e| e.action.is_approve())
    }

    /// Entries currently holding REQUESTING_REVIEW.
    pub fn reviewing_entries(&self) -> impl Iterator<Item = &ApprovalEntry> {
        self.approval_chain
            .iter()
            .filter(|e| e.action == ApprovalAction::RequestingReview)
    }

    pub fn reviewing_entry(&self) -> Option<&ApprovalEntry> {
        self.reviewing_entries().next()
    }

    /// Reset every entry to NO_ACTION.
    pub fn reset_chain(&mut self) {
        for entry in &mut self.approval_chain {
            entry.reset();
        }
    }

    /// Append a new entry at the end of the chain.
    pub fn append_entry(&mut self, approver: ApproverCode) -> u32 {
        let line = self.approval_chain.len() as u32;
        self.approval_chain.push(ApprovalEntry::new(line, approver));
        line
    }

    /// Whether `code` already holds a position in the chain.
    pub fn chain_contains(&self, code: &ApproverCode) -> bool {
        self.approval_chain.iter().any(|e| &e.approver == code)
    }

    // ── Notes ────────────────────────────────────────────────────────

    pub fn note(
        &mut self,
        author: IdentityId,
        kind: NoteKind,
        text: impl Into<String>,
        mentions: Vec<String>,
        at: DateTime<Utc>,
    ) -> u32 {
        append_note(&mut self.note_log, author, kind, text, mentions, at)
    }

    pub fn system_note(&mut self, text: impl Into<String>, at: DateTime<Utc>) -> u32 {
        append_system_note(&mut self.note_log, text, at)
    }

    /// The most recent review-request note.
    pub fn latest_review_request(&self) -> Option<&Note> {
        self.note_log
            .iter()
            .rev()
            .find(|n| n.kind == NoteKind::ReviewRequest)
    }

    /// Whether any reply was logged after the latest review request.
    pub fn review_answered(&self) -> bool {
        match self.latest_review_request() {
            Some(request) => self
                .note_log
                .iter()
                .skip(request.line_number as usize + 1)
                .any(|n| n.kind == NoteKind::ReviewReply),
            None => false,
        }
    }

    // ── Line items ───────────────────────────────────────────────────

    pub fn line_item(&self, line_number: u32) -> Option<&LineItem> {
        self.line_items
            .iter()
            .find(|l| l.line_number == line_number)
    }

    pub fn all_items_done(&self) -> bool {
        self.line_items.iter().all(|l| l.is_done())
    }

    pub fn any_item_waiting(&self) -> bool {
        self.line_items
            .iter()
            .any(|l| l.status == LineItemStatus::Waiting)
    }

    pub fn any_item_done(&self) -> bool {
        self.line_items.iter().any(|l| l.is_done())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DocumentStatus::Rejected | DocumentStatus::Done)
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Field-level checks run before anything is submitted.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.title.trim().is_empty() {
            return Err(WorkflowError::validation("title", "title is required"));
        }
        if self.recipient.as_str().trim().is_empty() {
            return Err(WorkflowError::validation(
                "recipient",
                "recipient is required",
            ));
        }
        if !is_dense(&self.approval_chain) {
            return Err(WorkflowError::validation(
                "approval_chain",
                "line numbers must be dense and start at 0",
            ));
        }
        validate_line_items(&self.line_items)
    }
}

/// Line items must be numbered densely from 0, described, and non-empty.
pub fn validate_line_items(items: &[LineItem]) -> WorkflowResult<()> {
    for (i, item) in items.iter().enumerate() {
        if item.line_number != i as u32 {
            return Err(WorkflowError::validation(
                "line_items",
                format!("expected line {} but found {}", i, item.line_number),
            ));
        }
        if item.description.trim().is_empty() {
            return Err(WorkflowError::validation(
                "line_items",
                format!("line {} has no description", i),
            ));
        }
        if item.quantity == 0 {
            return Err(WorkflowError::validation(
                "line_items",
                format!("line {} has zero quantity", i),
            ));
        }
    }
    Ok(())
}
