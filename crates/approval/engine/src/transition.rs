//! Status transition engine
//!
//! Maps (status, chain state, submitted feedback) to the next status. The
//! edges are:
//!
//! - create: UNPUBLISHED, or straight to the chain-cleared status when the
//!   chain is empty
//! - approve: the pointer moves on; clearing the chain applies the
//!   chain-cleared outcome
//! - revision / reject: REVISION or REJECTED, with a system note
//! - publisher finishes revision: completes, resumes from the flagged entry,
//!   or restarts the whole chain when content changed after approval
//! - recipient feedback (tickets only): DONE, REVISION or REJECTED, guarded
//!   by line-item progress
//!
//! Methods mutate the document they are given. Callers that need
//! all-or-nothing behaviour work on a copy (see `WorkflowEngine::apply`).

use crate::actor::Actor;
use crate::chain_evaluator::{current_position, ChainEvaluator, ChainPosition};
use crate::reset_policy::requires_full_reset;
use approval_types::*;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, Default)]
pub struct TransitionEngine {
    evaluator: ChainEvaluator,
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self {
            evaluator: ChainEvaluator::new(),
        }
    }

    // ── Create ───────────────────────────────────────────────────────

    /// Prepare a new document for its first save.
    pub fn create(&self, doc: &mut Document, actor: &Actor, now: DateTime<Utc>) -> WorkflowResult<()> {
        if doc.number.is_some() {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "document has already been created",
            ));
        }
        if &doc.originator != actor.identity() {
            return Err(WorkflowError::NotPermitted {
                role: role_label(None),
                operation: "create a document for another publisher",
            });
        }
        doc.validate()?;
        if !doc.note_log.is_empty() {
            return Err(WorkflowError::validation(
                "note_log",
                "a new document starts with an empty note log",
            ));
        }
        if let Some(item) = doc.line_items.iter().find(|l| !l.is_fresh()) {
            return Err(WorkflowError::validation(
                "line_items",
                format!(
                    "line {} must start waiting and unassigned, with no dates or notes",
                    item.line_number
                ),
            ));
        }
        if let Some(entry) = doc
            .approval_chain
            .iter()
            .find(|e| e.action != ApprovalAction::NoAction)
        {
            return Err(WorkflowError::validation(
                "approval_chain",
                format!("line {} must start with no action", entry.line_number),
            ));
        }
        if let Some(entry) = doc
            .approval_chain
            .iter()
            .find(|e| !actor.directory.is_active_code(&e.approver))
        {
            return Err(WorkflowError::validation(
                "approval_chain",
                format!("approver code {} is not active", entry.approver),
            ));
        }

        doc.status = DocumentStatus::Unpublished;
        doc.created_at = now;
        doc.system_note(format!("Created by {}", actor.identity()), now);

        if current_position(&doc.approval_chain).is_cleared() {
            self.on_chain_cleared(doc, now);
        }

        tracing::info!(
            document = %doc.label(),
            kind = ?doc.kind,
            status = %doc.status,
            chain_len = doc.approval_chain.len(),
            "Document prepared for creation"
        );
        Ok(())
    }

    // ── Approval Feedback ────────────────────────────────────────────

    /// Apply APPROVE, REVISION or REJECT to the current entry.
    pub fn submit_feedback(
        &self,
        doc: &mut Document,
        actor: &Actor,
        line_number: u32,
        feedback: &Feedback,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let index = self.require_current(doc, line_number)?;
        let role = self.require_chain_actor(doc, actor, index, "submit approval feedback")?;

        let comment = non_blank(feedback.comment.as_deref());
        if feedback.action != FeedbackAction::Approve && comment.is_none() {
            return Err(WorkflowError::validation(
                "comment",
                "a comment is required to request revision or reject",
            ));
        }

        if doc.approval_chain[index].action == ApprovalAction::RequestingReview
            && !doc.review_answered()
            && !feedback.ignore_mentioned
        {
            return Err(WorkflowError::ConfirmationRequired(
                Confirmation::IgnoreMentioned,
            ));
        }

        let identity = actor.identity();
        let action: ApprovalAction = feedback.action.into();
        let entry = &mut doc.approval_chain[index];
        entry.record(action.clone(), now);
        if let Some(attachment) = &feedback.attachment {
            entry.attachment = Some(attachment.clone());
        }
        let approver = entry.approver.clone();

        doc.system_note(
            format!(
                "Line {} ({}) {} by {} as {}",
                line_number,
                approver,
                action.label(),
                identity,
                role
            ),
            now,
        );
        if let Some(comment) = comment {
            doc.note(identity.clone(), NoteKind::Comment, comment, Vec::new(), now);
        }

        match feedback.action {
            FeedbackAction::Approve => {
                if current_position(&doc.approval_chain).is_cleared() {
                    self.on_chain_cleared(doc, now);
                }
            }
            FeedbackAction::Revision => doc.status = DocumentStatus::Revision,
            FeedbackAction::Reject => doc.status = DocumentStatus::Rejected,
        }

        tracing::info!(
            document = %doc.label(),
            line = line_number,
            action = ?feedback.action,
            role = %role,
            status = %doc.status,
            "Approval feedback applied"
        );
        Ok(())
    }

    /// Hand the current entry to a delegate (PIC).
    pub fn delegate(
        &self,
        doc: &mut Document,
        actor: &Actor,
        line_number: u32,
        delegate: &IdentityId,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let index = self.require_current(doc, line_number)?;
        let role = self.require_chain_actor(doc, actor, index, "delegate this entry")?;
        if role != Role::Approver {
            return Err(WorkflowError::NotPermitted {
                role: role.as_str(),
                operation: "delegate this entry again",
            });
        }
        if doc.approval_chain[index].action == ApprovalAction::RequestingReview {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "cannot delegate while a review is pending",
            ));
        }
        if delegate == actor.identity() || !actor.directory.is_known_identity(delegate) {
            return Err(WorkflowError::validation(
                "delegate",
                format!("{} cannot be assigned as delegate", delegate),
            ));
        }

        let entry = &mut doc.approval_chain[index];
        entry.delegate = Some(delegate.clone());
        entry.record(ApprovalAction::Delegate(delegate.clone()), now);
        let approver = entry.approver.clone();

        doc.system_note(
            format!(
                "Line {} ({}) delegated to {} by {}",
                line_number,
                approver,
                delegate,
                actor.identity()
            ),
            now,
        );

        tracing::info!(
            document = %doc.label(),
            line = line_number,
            delegate = %delegate,
            "Approval entry delegated"
        );
        Ok(())
    }

    // ── Publisher Edits ──────────────────────────────────────────────

    /// Publisher edit while the chain is still running.
    pub fn edit(
        &self,
        doc: &mut Document,
        actor: &Actor,
        submission: &RevisionSubmission,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if doc.status != DocumentStatus::Unpublished {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "only UNPUBLISHED documents can be edited",
            ));
        }
        self.require_publisher(doc, actor, "edit this document")?;
        validate_edit(doc, &submission.edit)?;

        let full_reset = requires_full_reset(doc, &submission.edit);
        self.apply_edit(doc, actor, submission, now);

        if full_reset {
            doc.reset_chain();
            doc.system_note("Content changed after approval; approval chain reset", now);
        }

        tracing::info!(
            document = %doc.label(),
            full_reset,
            "Document edited"
        );
        Ok(())
    }

    /// Publisher resubmits after a revision request.
    pub fn finish_revision(
        &self,
        doc: &mut Document,
        actor: &Actor,
        submission: &RevisionSubmission,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if doc.status != DocumentStatus::Revision {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "document is not awaiting revision",
            ));
        }
        self.require_publisher(doc, actor, "finish this revision")?;
        validate_edit(doc, &submission.edit)?;

        let full_reset = requires_full_reset(doc, &submission.edit);
        self.apply_edit(doc, actor, submission, now);

        let flagged = doc
            .approval_chain
            .iter()
            .position(|e| e.action == ApprovalAction::Revision);
        let others_pending = doc
            .approval_chain
            .iter()
            .enumerate()
            .any(|(i, e)| !e.action.is_approve() && Some(i) != flagged);

        if full_reset {
            doc.reset_chain();
            doc.status = DocumentStatus::Unpublished;
            doc.system_note(
                "Content changed after approval; approval chain reset for full re-approval",
                now,
            );
        } else if submission.done_revising && !others_pending {
            if let Some(i) = flagged {
                doc.approval_chain[i].record(ApprovalAction::Approve, now);
            }
            doc.system_note(format!("Revision completed by {}", actor.identity()), now);
            self.on_chain_cleared(doc, now);
        } else {
            if let Some(i) = flagged {
                doc.approval_chain[i].reset();
                let line = doc.approval_chain[i].line_number;
                doc.system_note(format!("Revision submitted; line {} resumes", line), now);
            }
            doc.status = DocumentStatus::Unpublished;
        }

        // Revision requested after the chain cleared: nothing left to approve.
        if doc.status == DocumentStatus::Unpublished
            && current_position(&doc.approval_chain).is_cleared()
        {
            self.on_chain_cleared(doc, now);
        }

        tracing::info!(
            document = %doc.label(),
            full_reset,
            done_revising = submission.done_revising,
            status = %doc.status,
            "Revision finished"
        );
        Ok(())
    }

    // ── Recipient Feedback ───────────────────────────────────────────

    pub fn recipient_feedback(
        &self,
        doc: &mut Document,
        actor: &Actor,
        feedback: &RecipientFeedback,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if !doc.kind.has_recipient_stage() {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "delivery notes have no recipient feedback stage",
            ));
        }
        if doc.status != DocumentStatus::AwaitingRecipient {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "document is not awaiting recipient feedback",
            ));
        }
        let identity = actor.identity();
        if !actor.directory.acts_for(identity, &doc.recipient) {
            let role = self.evaluator.evaluate(doc, identity, actor.directory).role;
            return Err(WorkflowError::NotPermitted {
                role: role_label(role),
                operation: "give recipient feedback",
            });
        }

        let comment = non_blank(feedback.comment.as_deref());
        match feedback.decision {
            RecipientDecision::Done => {
                if !doc.all_items_done() {
                    return Err(WorkflowError::invalid_transition(
                        doc.status,
                        "every line item must be DONE",
                    ));
                }
            }
            RecipientDecision::Revision => {
                if !doc.any_item_waiting() {
                    return Err(WorkflowError::invalid_transition(
                        doc.status,
                        "revision needs at least one WAITING line item",
                    ));
                }
                self.require_never_reopened(doc, "revision")?;
            }
            RecipientDecision::Rejected => {
                if doc.any_item_done() {
                    return Err(WorkflowError::invalid_transition(
                        doc.status,
                        "cannot reject once a line item is DONE",
                    ));
                }
                self.require_never_reopened(doc, "rejection")?;
            }
        }
        if feedback.decision != RecipientDecision::Done && comment.is_none() {
            return Err(WorkflowError::validation(
                "comment",
                "a comment is required to request revision or reject",
            ));
        }

        if let Some(attachment) = &feedback.attachment {
            doc.recipient_attachment = Some(attachment.clone());
        }
        match feedback.decision {
            RecipientDecision::Done => self.complete(doc, DocumentStatus::AwaitingRecipient, now),
            RecipientDecision::Revision => doc.status = DocumentStatus::Revision,
            RecipientDecision::Rejected => doc.status = DocumentStatus::Rejected,
        }

        doc.system_note(
            format!("Recipient feedback {:?} by {}", feedback.decision, identity),
            now,
        );
        if let Some(comment) = comment {
            doc.note(identity.clone(), NoteKind::Comment, comment, Vec::new(), now);
        }

        tracing::info!(
            document = %doc.label(),
            decision = ?feedback.decision,
            status = %doc.status,
            "Recipient feedback applied"
        );
        Ok(())
    }

    // ── Shared Rules ─────────────────────────────────────────────────

    /// Apply the outcome of a cleared chain for this document's kind.
    pub fn on_chain_cleared(&self, doc: &mut Document, now: DateTime<Utc>) {
        match doc.kind.chain_cleared_status() {
            DocumentStatus::Done => self.complete(doc, DocumentStatus::Unpublished, now),
            status => {
                doc.status = status;
                doc.received_at = Some(now);
                for item in &mut doc.line_items {
                    item.received_date.get_or_insert(now);
                }
                doc.system_note("Approval chain cleared; awaiting recipient", now);
            }
        }
    }

    fn complete(&self, doc: &mut Document, previous: DocumentStatus, now: DateTime<Utc>) {
        doc.pre_completion_status = Some(previous);
        doc.status = DocumentStatus::Done;
        doc.completed_at = Some(now);
        doc.system_note("Document completed", now);
    }

    /// Index of the current entry, provided it is `line_number`.
    pub fn require_current(&self, doc: &Document, line_number: u32) -> WorkflowResult<usize> {
        if doc.status != DocumentStatus::Unpublished {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "approval actions are only accepted while UNPUBLISHED",
            ));
        }
        match current_position(&doc.approval_chain) {
            ChainPosition::Current { index, line_number: current } if current == line_number => {
                Ok(index)
            }
            position => Err(WorkflowError::StaleChain {
                expected: line_number,
                actual: position.line_number(),
            }),
        }
    }

    /// The chain role `actor` holds on the entry at `index`.
    pub fn require_chain_actor(
        &self,
        doc: &Document,
        actor: &Actor,
        index: usize,
        operation: &'static str,
    ) -> WorkflowResult<Role> {
        let identity = actor.identity();
        self.evaluator
            .chain_role(&doc.approval_chain[index], identity, actor.directory)
            .ok_or_else(|| WorkflowError::NotPermitted {
                role: role_label(self.evaluator.evaluate(doc, identity, actor.directory).role),
                operation,
            })
    }

    fn require_publisher(
        &self,
        doc: &Document,
        actor: &Actor,
        operation: &'static str,
    ) -> WorkflowResult<()> {
        let identity = actor.identity();
        if &doc.originator == identity {
            return Ok(());
        }
        Err(WorkflowError::NotPermitted {
            role: role_label(self.evaluator.evaluate(doc, identity, actor.directory).role),
            operation,
        })
    }

    fn require_never_reopened(&self, doc: &Document, what: &str) -> WorkflowResult<()> {
        if doc.reopen_count > 0 {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                format!("{} is not available on a reopened document", what),
            ));
        }
        Ok(())
    }

    fn apply_edit(
        &self,
        doc: &mut Document,
        actor: &Actor,
        submission: &RevisionSubmission,
        now: DateTime<Utc>,
    ) {
        let edit = &submission.edit;
        doc.title = edit.title.clone();
        doc.recipient = edit.recipient.clone();
        doc.attachment = edit.attachment.clone();
        let line_items = edit
            .line_items
            .iter()
            .map(|item| match doc.line_item(item.line_number) {
                Some(stored) => LineItem {
                    description: item.description.clone(),
                    quantity: item.quantity,
                    ..stored.clone()
                },
                None => LineItem::new(item.line_number, item.description.clone(), item.quantity),
            })
            .collect();
        doc.line_items = line_items;
        if let Some(note) = non_blank(submission.note.as_deref()) {
            doc.note(actor.identity().clone(), NoteKind::Comment, note, Vec::new(), now);
        }
    }
}

/// Field checks on a publisher edit of `doc`.
///
/// The publisher owns description and quantity only. A submitted line must
/// carry the stored line's lifecycle unchanged, and a new line must be fresh.
pub fn validate_edit(doc: &Document, edit: &DocumentEdit) -> WorkflowResult<()> {
    if edit.title.trim().is_empty() {
        return Err(WorkflowError::validation("title", "title is required"));
    }
    if edit.recipient.as_str().trim().is_empty() {
        return Err(WorkflowError::validation("recipient", "recipient is required"));
    }
    validate_line_items(&edit.line_items)?;
    for item in &edit.line_items {
        let untouched = match doc.line_item(item.line_number) {
            Some(stored) => item.same_lifecycle(stored),
            None => item.is_fresh(),
        };
        if !untouched {
            return Err(WorkflowError::validation(
                "line_items",
                format!(
                    "line {}: only description and quantity can be edited",
                    item.line_number
                ),
            ));
        }
    }
    Ok(())
}

pub(crate) fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}
