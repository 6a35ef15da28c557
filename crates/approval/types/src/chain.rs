//! Approval chain entries
//!
//! The chain is totally ordered by `line_number` (dense, 0-based). An entry
//! may act only once every entry before it has approved.

use crate::{ApproverCode, Attachment, IdentityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an approval entry has done so far
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    NoAction,
    Approve,
    Revision,
    Reject,
    RequestingReview,
    /// The entry was handed to a delegate who now acts on it.
    Delegate(IdentityId),
}

impl ApprovalAction {
    pub fn is_approve(&self) -> bool {
        matches!(self, ApprovalAction::Approve)
    }

    /// Actions after which the approver at this entry can still act.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ApprovalAction::NoAction | ApprovalAction::RequestingReview
        )
    }

    pub fn delegate(&self) -> Option<&IdentityId> {
        match self {
            ApprovalAction::Delegate(id) => Some(id),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApprovalAction::NoAction => "no action",
            ApprovalAction::Approve => "approved",
            ApprovalAction::Revision => "requested revision",
            ApprovalAction::Reject => "rejected",
            ApprovalAction::RequestingReview => "requested review",
            ApprovalAction::Delegate(_) => "delegated",
        }
    }
}

/// One position in a document's approval chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEntry {
    /// Position in the chain; dense and 0-based
    pub line_number: u32,
    /// The department code holding this position
    pub approver: ApproverCode,
    pub action: ApprovalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_date: Option<DateTime<Utc>>,
    /// Reference to the delegate (PIC) assigned to this entry, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ApprovalEntry {
    pub fn new(line_number: u32, approver: ApproverCode) -> Self {
        Self {
            line_number,
            approver,
            action: ApprovalAction::NoAction,
            action_date: None,
            delegate: None,
            attachment: None,
        }
    }

    /// Put this entry back to its untouched state.
    pub fn reset(&mut self) {
        self.action = ApprovalAction::NoAction;
        self.action_date = None;
        self.delegate = None;
        self.attachment = None;
    }

    pub fn record(&mut self, action: ApprovalAction, at: DateTime<Utc>) {
        self.action = action;
        self.action_date = Some(at);
    }
}

/// Build a chain from approver codes, numbering entries densely.
pub fn chain_of<I, C>(codes: I) -> Vec<ApprovalEntry>
where
    I: IntoIterator<Item = C>,
    C: Into<String>,
{
    codes
        .into_iter()
        .enumerate()
        .map(|(i, code)| ApprovalEntry::new(i as u32, ApproverCode::new(code)))
        .collect()
}

/// Whether line numbers are exactly `0..len` in order.
pub fn is_dense(chain: &[ApprovalEntry]) -> bool {
    chain
        .iter()
        .enumerate()
        .all(|(i, e)| e.line_number == i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_of_numbers_densely() {
        let chain = chain_of(["FINA", "PROC", "DIRS"]);
        assert_eq!(chain.len(), 3);
        assert!(is_dense(&chain));
        assert_eq!(chain[2].approver, ApproverCode::new("DIRS"));
        assert!(chain.iter().all(|e| e.action == ApprovalAction::NoAction));
    }

    #[test]
    fn test_reset_clears_delegate() {
        let mut entry = ApprovalEntry::new(0, ApproverCode::new("FINA"));
        entry.delegate = Some(IdentityId::new("pic.one"));
        entry.record(ApprovalAction::Delegate(IdentityId::new("pic.one")), Utc::now());
        entry.reset();
        assert_eq!(entry.action, ApprovalAction::NoAction);
        assert!(entry.delegate.is_none());
        assert!(entry.action_date.is_none());
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&ApprovalAction::RequestingReview).unwrap();
        assert_eq!(json, "\"REQUESTING_REVIEW\"");
        let delegate = ApprovalAction::Delegate(IdentityId::new("pic.one"));
        let json = serde_json::to_string(&delegate).unwrap();
        let back: ApprovalAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, delegate);
    }

    #[test]
    fn test_open_actions() {
        assert!(ApprovalAction::NoAction.is_open());
        assert!(ApprovalAction::RequestingReview.is_open());
        assert!(!ApprovalAction::Approve.is_open());
        assert!(!ApprovalAction::Delegate(IdentityId::new("x")).is_open());
    }
}
