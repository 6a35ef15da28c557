//! CC chain evaluator: finds the acting chain entry and derives the caller's role
//!
//! The current entry is the lowest-numbered entry whose action is not
//! APPROVE. Every entry before it has approved by construction. When no
//! such entry exists (or the chain is empty) the chain is cleared.
//!
//! Everything here is pure: the same document, identity and directory
//! always produce the same position and role.

use approval_types::{
    ApprovalAction, ApprovalEntry, Document, IdentityId, OrgDirectory, Role,
};
use serde::{Deserialize, Serialize};

/// Where the chain currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainPosition {
    /// `index` is the entry's position in the vector
    Current { index: usize, line_number: u32 },
    Cleared,
}

impl ChainPosition {
    pub fn is_cleared(&self) -> bool {
        matches!(self, ChainPosition::Cleared)
    }

    pub fn line_number(&self) -> Option<u32> {
        match self {
            ChainPosition::Current { line_number, .. } => Some(*line_number),
            ChainPosition::Cleared => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            ChainPosition::Current { index, .. } => Some(*index),
            ChainPosition::Cleared => None,
        }
    }
}

/// Locate the current entry of a chain.
pub fn current_position(chain: &[ApprovalEntry]) -> ChainPosition {
    chain
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.action.is_approve())
        .min_by_key(|(_, e)| e.line_number)
        .map_or(ChainPosition::Cleared, |(index, e)| ChainPosition::Current {
            index,
            line_number: e.line_number,
        })
}

/// Result of evaluating a document for one identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub position: ChainPosition,
    pub role: Option<Role>,
}

/// Evaluates approval chains and derives roles
#[derive(Clone, Debug, Default)]
pub struct ChainEvaluator;

impl ChainEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the chain position and the caller's role together.
    pub fn evaluate(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
    ) -> Evaluation {
        let position = current_position(&doc.approval_chain);
        let role = self.derive_role(doc, position, identity, directory);

        tracing::debug!(
            document = %doc.label(),
            identity = %identity,
            position = ?position,
            role = ?role,
            "Chain evaluated"
        );

        Evaluation { position, role }
    }

    /// Derive a role. Chain roles at the current entry win, then
    /// reviewer, then the publisher and recipient sides.
    pub fn derive_role(
        &self,
        doc: &Document,
        position: ChainPosition,
        identity: &IdentityId,
        directory: &OrgDirectory,
    ) -> Option<Role> {
        if let Some(index) = position.index() {
            let entry = &doc.approval_chain[index];
            if let Some(role) = self.chain_role(entry, identity, directory) {
                return Some(role);
            }
        }

        if self.is_reviewer(doc, identity, directory) {
            return Some(Role::Reviewer);
        }

        if &doc.originator == identity {
            return Some(Role::Publisher);
        }

        if let Some(code) = directory.code_of(&doc.originator) {
            if directory.head_of(code) == Some(identity) {
                return Some(Role::PublisherDeptHead);
            }
        }

        if directory.acts_for(identity, &doc.recipient) {
            return Some(Role::Recipient);
        }

        if doc
            .line_items
            .iter()
            .any(|l| l.assignee.as_ref() == Some(identity))
        {
            return Some(Role::RecipientDelegate);
        }

        None
    }

    /// Role held on a specific entry, if it is open to `identity`.
    pub fn chain_role(
        &self,
        entry: &ApprovalEntry,
        identity: &IdentityId,
        directory: &OrgDirectory,
    ) -> Option<Role> {
        match &entry.action {
            ApprovalAction::Delegate(delegate) if delegate == identity => {
                Some(Role::ApproverDelegate)
            }
            // A delegate that raised a review keeps the entry while it is open.
            ApprovalAction::RequestingReview if entry.delegate.as_ref() == Some(identity) => {
                Some(Role::ApproverDelegate)
            }
            ApprovalAction::RequestingReview if entry.delegate.is_some() => None,
            action if action.is_open() && directory.acts_for(identity, &entry.approver) => {
                Some(Role::Approver)
            }
            _ => None,
        }
    }

    /// Named in the latest review request while a review is pending.
    pub fn is_reviewer(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
    ) -> bool {
        if doc.reviewing_entry().is_none() {
            return false;
        }
        doc.latest_review_request()
            .is_some_and(|note| directory.mentioned(&note.mentions, identity))
    }

    /// Whether `identity` holds or held any position in the chain.
    pub fn is_chain_member(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
    ) -> bool {
        doc.approval_chain.iter().any(|e| {
            directory.acts_for(identity, &e.approver) || e.delegate.as_ref() == Some(identity)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::*;
    use chrono::Utc;

    fn directory() -> OrgDirectory {
        OrgDirectory::new()
            .with_code("DEPA", Some("depa.head"))
            .with_code("DEPB", Some("depb.head"))
            .with_code("ITSV", Some("itsv.head"))
            .with_code("SALE", Some("sale.head"))
            .with_person("a.member", Some("DEPA"), 1)
            .with_person("pub.one", Some("SALE"), 1)
            .with_person("tech.one", Some("ITSV"), 1)
    }

    fn document() -> Document {
        let mut doc = Document::draft(
            DocumentKind::Ticket,
            "Printer repair",
            IdentityId::new("pub.one"),
            ApproverCode::new("ITSV"),
        )
        .with_approver("DEPA")
        .with_approver("DEPB")
        .with_line_item("Replace fuser", 1);
        doc.number = Some(DocumentNumber::new("TKT-000001"));
        doc
    }

    fn id(s: &str) -> IdentityId {
        IdentityId::new(s)
    }

    #[test]
    fn test_current_is_lowest_non_approve() {
        let mut doc = document();
        assert_eq!(
            current_position(&doc.approval_chain),
            ChainPosition::Current {
                index: 0,
                line_number: 0
            }
        );
        doc.approval_chain[0].record(ApprovalAction::Approve, Utc::now());
        assert_eq!(current_position(&doc.approval_chain).line_number(), Some(1));
        doc.approval_chain[1].record(ApprovalAction::Approve, Utc::now());
        assert!(current_position(&doc.approval_chain).is_cleared());
    }

    #[test]
    fn test_empty_chain_is_cleared() {
        assert!(current_position(&[]).is_cleared());
    }

    #[test]
    fn test_unsorted_vector_uses_line_numbers() {
        let mut chain = chain_of(["DEPA", "DEPB"]);
        chain.swap(0, 1);
        assert_eq!(
            current_position(&chain),
            ChainPosition::Current {
                index: 1,
                line_number: 0
            }
        );
    }

    #[test]
    fn test_approver_by_code_member_and_head() {
        let doc = document();
        let eval = ChainEvaluator::new();
        let dir = directory();
        assert_eq!(
            eval.evaluate(&doc, &id("a.member"), &dir).role,
            Some(Role::Approver)
        );
        assert_eq!(
            eval.evaluate(&doc, &id("depa.head"), &dir).role,
            Some(Role::Approver)
        );
        // Next in line has no standing yet
        assert_eq!(eval.evaluate(&doc, &id("depb.head"), &dir).role, None);
    }

    #[test]
    fn test_delegate_replaces_approver() {
        let mut doc = document();
        doc.approval_chain[0].delegate = Some(id("pic.one"));
        doc.approval_chain[0].record(ApprovalAction::Delegate(id("pic.one")), Utc::now());
        let eval = ChainEvaluator::new();
        let dir = directory();
        assert_eq!(
            eval.evaluate(&doc, &id("pic.one"), &dir).role,
            Some(Role::ApproverDelegate)
        );
        assert_eq!(eval.evaluate(&doc, &id("depa.head"), &dir).role, None);
    }

    #[test]
    fn test_delegate_keeps_entry_while_requesting_review() {
        let mut doc = document();
        doc.approval_chain[0].delegate = Some(id("pic.one"));
        doc.approval_chain[0].record(ApprovalAction::RequestingReview, Utc::now());
        let eval = ChainEvaluator::new();
        let dir = directory();
        assert_eq!(
            eval.evaluate(&doc, &id("pic.one"), &dir).role,
            Some(Role::ApproverDelegate)
        );
        assert_eq!(eval.evaluate(&doc, &id("depa.head"), &dir).role, None);
    }

    #[test]
    fn test_reviewer_from_latest_request() {
        let mut doc = document();
        let now = Utc::now();
        doc.approval_chain[0].record(ApprovalAction::RequestingReview, now);
        doc.note(
            id("depa.head"),
            NoteKind::ReviewRequest,
            "please confirm the part number",
            vec!["DEPB".into()],
            now,
        );
        let eval = ChainEvaluator::new();
        let dir = directory();
        assert_eq!(
            eval.evaluate(&doc, &id("depb.head"), &dir).role,
            Some(Role::Reviewer)
        );
        // Once the review is closed nobody is a reviewer any more
        doc.approval_chain[0].record(ApprovalAction::Approve, now);
        assert_ne!(
            eval.evaluate(&doc, &id("depb.head"), &dir).role,
            Some(Role::Reviewer)
        );
    }

    #[test]
    fn test_publisher_side_roles() {
        let doc = document();
        let eval = ChainEvaluator::new();
        let dir = directory();
        assert_eq!(
            eval.evaluate(&doc, &id("pub.one"), &dir).role,
            Some(Role::Publisher)
        );
        assert_eq!(
            eval.evaluate(&doc, &id("sale.head"), &dir).role,
            Some(Role::PublisherDeptHead)
        );
        assert_eq!(
            eval.evaluate(&doc, &id("tech.one"), &dir).role,
            Some(Role::Recipient)
        );
    }

    #[test]
    fn test_assignee_is_recipient_delegate() {
        let mut doc = document();
        doc.line_items[0].assignee = Some(id("field.tech"));
        let eval = ChainEvaluator::new();
        assert_eq!(
            eval.evaluate(&doc, &id("field.tech"), &directory()).role,
            Some(Role::RecipientDelegate)
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let doc = document();
        let eval = ChainEvaluator::new();
        let dir = directory();
        let first = eval.evaluate(&doc, &id("a.member"), &dir);
        let second = eval.evaluate(&doc, &id("a.member"), &dir);
        assert_eq!(first, second);
    }
}
