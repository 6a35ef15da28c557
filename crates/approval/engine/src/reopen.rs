//! Reopen policy: time-bounded reversal of a DONE document
//!
//! Only the publisher, the recipient, or someone who held a position in the
//! approval chain may reopen, and only while less than the configured window
//! has passed since completion.

use crate::chain_evaluator::{current_position, ChainEvaluator};
use approval_types::{
    ApprovalAction, Document, DocumentStatus, IdentityId, OrgDirectory, Role, WorkflowError,
    WorkflowResult,
};
use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Debug)]
pub struct ReopenPolicy {
    window: Duration,
    evaluator: ChainEvaluator,
}

impl ReopenPolicy {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            evaluator: ChainEvaluator::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the document completed less than the window ago.
    pub fn within_window(&self, doc: &Document, now: DateTime<Utc>) -> bool {
        doc.completed_at
            .is_some_and(|completed| now - completed < self.window)
    }

    /// The reopen standing `identity` has on `doc`, if any.
    pub fn standing(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
    ) -> Option<Role> {
        [Role::Publisher, Role::Recipient, Role::Approver]
            .into_iter()
            .find(|role| self.holds(doc, identity, directory, *role))
    }

    /// Whether reopen is available to `identity` right now.
    pub fn can_reopen(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
        now: DateTime<Utc>,
    ) -> bool {
        doc.status == DocumentStatus::Done
            && self.within_window(doc, now)
            && !Self::nothing_to_reopen_into(doc)
            && self.standing(doc, identity, directory).is_some()
    }

    /// Status a reopen hands the document back to.
    pub fn restored_status(doc: &Document) -> DocumentStatus {
        doc.pre_completion_status.unwrap_or(if doc.kind.has_recipient_stage() {
            DocumentStatus::AwaitingRecipient
        } else {
            DocumentStatus::Unpublished
        })
    }

    /// Back to UNPUBLISHED with no chain entry to hand back.
    fn nothing_to_reopen_into(doc: &Document) -> bool {
        Self::restored_status(doc) == DocumentStatus::Unpublished && doc.approval_chain.is_empty()
    }

    /// Validate a reopen request made under `acting_role`.
    pub fn check(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
        acting_role: Role,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if doc.status != DocumentStatus::Done {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "only DONE documents can be reopened",
            ));
        }
        let completed = doc.completed_at.ok_or_else(|| {
            WorkflowError::invalid_transition(doc.status, "document has no completion timestamp")
        })?;
        if Self::nothing_to_reopen_into(doc) {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "the approval chain is empty, so there is no stage to reopen into",
            ));
        }
        let elapsed = now - completed;
        if elapsed >= self.window {
            return Err(WorkflowError::ReopenWindowExpired {
                elapsed_days: elapsed.num_days(),
                limit_days: self.window.num_days(),
            });
        }
        if !self.holds(doc, identity, directory, acting_role) {
            return Err(WorkflowError::NotPermitted {
                role: acting_role.as_str(),
                operation: "reopen this document",
            });
        }
        Ok(())
    }

    /// Restore the pre-completion status. Caller has run [`Self::check`].
    pub fn apply(&self, doc: &mut Document, identity: &IdentityId, now: DateTime<Utc>) {
        let restored = Self::restored_status(doc);

        doc.status = restored;
        doc.pre_completion_status = None;
        doc.completed_at = None;
        doc.reopen_count += 1;
        doc.reopened_at = Some(now);

        // A document reopened into the chain stage needs someone to act:
        // hand the final position back.
        if restored == DocumentStatus::Unpublished
            && current_position(&doc.approval_chain).is_cleared()
        {
            if let Some(last) = doc.approval_chain.iter_mut().max_by_key(|e| e.line_number) {
                last.reset();
            }
        }

        doc.system_note(
            format!("Reopened by {}; status restored to {}", identity, restored),
            now,
        );
    }

    fn holds(
        &self,
        doc: &Document,
        identity: &IdentityId,
        directory: &OrgDirectory,
        role: Role,
    ) -> bool {
        match role {
            Role::Publisher => &doc.originator == identity,
            Role::Recipient => directory.acts_for(identity, &doc.recipient),
            Role::Approver | Role::ApproverDelegate => {
                self.evaluator.is_chain_member(doc, identity, directory)
                    || doc
                        .approval_chain
                        .iter()
                        .any(|e| e.action == ApprovalAction::Delegate(identity.clone()))
            }
            _ => false,
        }
    }
}
