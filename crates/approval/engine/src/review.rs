//! Review escalation
//!
//! The holder of the current entry may ask third parties for input without
//! giving up the position. The entry moves to REQUESTING_REVIEW, a
//! review-request note records who was mentioned, and the named reviewers
//! answer with notes only. At most one entry may be requesting review at
//! any time.

use crate::actor::Actor;
use crate::transition::{non_blank, TransitionEngine};
use approval_types::*;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug)]
pub struct ReviewEscalation {
    qualifying_seniority: u8,
    transitions: TransitionEngine,
}

impl ReviewEscalation {
    pub fn new(qualifying_seniority: u8) -> Self {
        Self {
            qualifying_seniority,
            transitions: TransitionEngine::new(),
        }
    }

    // ── Request ──────────────────────────────────────────────────────

    /// Put the current entry into REQUESTING_REVIEW.
    pub fn request_review(
        &self,
        doc: &mut Document,
        actor: &Actor,
        line_number: u32,
        request: &ReviewRequest,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if doc.status != DocumentStatus::Unpublished {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "review can only be requested while UNPUBLISHED",
            ));
        }
        if let Some(entry) = doc.reviewing_entry() {
            return Err(WorkflowError::CannotStackReview(entry.line_number));
        }
        let index = self.transitions.require_current(doc, line_number)?;
        let role = self
            .transitions
            .require_chain_actor(doc, actor, index, "request review")?;

        let comment = non_blank(Some(request.comment.as_str())).ok_or_else(|| {
            WorkflowError::validation("comment", "a comment is required to request review")
        })?;
        let parties = self.resolve_mentions(actor.directory, &request.mentions)?;

        let identity = actor.identity();
        if actor.directory.is_top_authority(identity) {
            let missing = missing_from_chain(doc, actor.directory, &parties);
            if !missing.is_empty() {
                if !request.confirm_append {
                    let names = missing.iter().map(ToString::to_string).collect();
                    return Err(WorkflowError::ConfirmationRequired(
                        Confirmation::AppendMentionsToChain(names),
                    ));
                }
                for code in missing {
                    let line = doc.append_entry(code.clone());
                    doc.system_note(
                        format!("{} appended to the approval chain at line {}", code, line),
                        now,
                    );
                }
            }
        }

        let entry = &mut doc.approval_chain[index];
        entry.record(ApprovalAction::RequestingReview, now);
        let approver = entry.approver.clone();

        doc.note(
            identity.clone(),
            NoteKind::ReviewRequest,
            comment,
            request.mentions.clone(),
            now,
        );
        doc.system_note(
            format!(
                "Line {} ({}) requesting review by {} as {}",
                line_number, approver, identity, role
            ),
            now,
        );

        tracing::info!(
            document = %doc.label(),
            line = line_number,
            mentions = ?request.mentions,
            "Review requested"
        );
        Ok(())
    }

    /// Resolve every mention, failing on the first that names nobody.
    pub fn resolve_mentions(
        &self,
        directory: &OrgDirectory,
        mentions: &[String],
    ) -> WorkflowResult<Vec<Party>> {
        if mentions.iter().all(|m| m.trim().is_empty()) {
            return Err(WorkflowError::validation(
                "mentions",
                "at least one mention is required",
            ));
        }
        mentions
            .iter()
            .filter(|m| !m.trim().is_empty())
            .map(|m| {
                directory
                    .resolve_mention(m)
                    .ok_or_else(|| WorkflowError::UnresolvedMention(m.clone()))
            })
            .collect()
    }

    // ── Reply ────────────────────────────────────────────────────────

    /// Append a reviewer's answer. No chain action is taken.
    pub fn reply(
        &self,
        doc: &mut Document,
        actor: &Actor,
        text: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        if doc.reviewing_entry().is_none() {
            return Err(WorkflowError::NoPendingReview);
        }
        let identity = actor.identity();
        if !self.can_reply(doc, identity, actor.directory) {
            return Err(WorkflowError::NotPermitted {
                role: role_label(None),
                operation: "reply to this review",
            });
        }
        let text = non_blank(Some(text))
            .ok_or_else(|| WorkflowError::validation("text", "reply text is required"))?;

        doc.note(identity.clone(), NoteKind::ReviewReply, text, Vec::new(), now);

        tracing::info!(
            document = %doc.label(),
            reviewer = %identity,
            "Review reply recorded"
        );
        Ok(())
    }

    /// Named reviewers may reply. On the top authority's own position its
    /// superior and anyone at the qualifying seniority may reply as well.
    pub fn can_reply(&self, doc: &Document, identity: &IdentityId, directory: &OrgDirectory) -> bool {
        let Some(entry) = doc.reviewing_entry() else {
            return false;
        };
        let named = doc
            .latest_review_request()
            .is_some_and(|note| directory.mentioned(&note.mentions, identity));
        if named {
            return true;
        }

        if directory.top_authority_code() != Some(&entry.approver) {
            return false;
        }
        let is_superior = directory
            .top_authority
            .as_ref()
            .and_then(|top| directory.superior_of(top))
            == Some(identity);
        is_superior || directory.seniority_of(identity) >= self.qualifying_seniority
    }
}

/// Chain codes of mentioned parties that do not yet hold a position.
fn missing_from_chain(doc: &Document, directory: &OrgDirectory, parties: &[Party]) -> Vec<ApproverCode> {
    let mut missing: Vec<ApproverCode> = Vec::new();
    for code in parties.iter().filter_map(|p| directory.chain_code_of(p)) {
        if !doc.chain_contains(&code) && !missing.contains(&code) {
            missing.push(code);
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_evaluator::current_position;

    fn directory() -> OrgDirectory {
        OrgDirectory::new()
            .with_code("DEPA", Some("depa.head"))
            .with_code("DEPB", Some("depb.head"))
            .with_code("LEGL", Some("legal.head"))
            .with_code("BOAR", Some("ceo"))
            .with_person("pub.one", None, 1)
            .with_person("chair", None, 1)
            .with_person("senior.vp", None, 4)
            .with_superior("ceo", "chair")
            .with_top_authority("ceo")
    }

    fn document(chain: &[&str]) -> Document {
        let mut doc = Document::draft(
            DocumentKind::Ticket,
            "Vendor contract",
            IdentityId::new("pub.one"),
            ApproverCode::new("DEPB"),
        )
        .with_line_item("Contract review", 1);
        for code in chain {
            doc = doc.with_approver(*code);
        }
        doc.number = Some(DocumentNumber::new("TKT-000007"));
        doc
    }

    fn session(id: &str) -> SessionContext {
        SessionContext::new(id)
    }

    #[test]
    fn test_request_review_keeps_position() {
        let mut doc = document(&["DEPA", "DEPB"]);
        let dir = directory();
        let review = ReviewEscalation::new(3);
        review
            .request_review(
                &mut doc,
                &Actor::new(&session("depa.head"), &dir),
                0,
                &ReviewRequest::new(["LEGL"], "is clause 4 acceptable?"),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(doc.approval_chain[0].action, ApprovalAction::RequestingReview);
        assert_eq!(current_position(&doc.approval_chain).line_number(), Some(0));
        let request = doc.latest_review_request().unwrap();
        assert_eq!(request.mentions, vec!["LEGL".to_string()]);
    }

    #[test]
    fn test_cannot_stack_review() {
        let mut doc = document(&["DEPA", "DEPB"]);
        doc.approval_chain[0].record(ApprovalAction::RequestingReview, Utc::now());
        let before = doc.clone();
        let dir = directory();
        let err = ReviewEscalation::new(3)
            .request_review(
                &mut doc,
                &Actor::new(&session("depa.head"), &dir),
                0,
                &ReviewRequest::new(["LEGL"], "again"),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, WorkflowError::CannotStackReview(0));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_mentions_and_comment_required() {
        let mut doc = document(&["DEPA"]);
        let dir = directory();
        let review = ReviewEscalation::new(3);
        let actor_session = session("depa.head");
        let actor = Actor::new(&actor_session, &dir);

        let no_mentions = ReviewRequest::new(Vec::<String>::new(), "question");
        assert!(review
            .request_review(&mut doc, &actor, 0, &no_mentions, Utc::now())
            .unwrap_err()
            .is_validation());

        let no_comment = ReviewRequest::new(["LEGL"], "  ");
        assert!(review
            .request_review(&mut doc, &actor, 0, &no_comment, Utc::now())
            .unwrap_err()
            .is_validation());

        let unknown = ReviewRequest::new(["ZZZZ"], "question");
        assert_eq!(
            review
                .request_review(&mut doc, &actor, 0, &unknown, Utc::now())
                .unwrap_err(),
            WorkflowError::UnresolvedMention("ZZZZ".into())
        );
        assert_eq!(doc.approval_chain[0].action, ApprovalAction::NoAction);
    }

    #[test]
    fn test_plain_member_cannot_be_mentioned() {
        let dir = directory();
        let review = ReviewEscalation::new(3);
        let mentions = vec!["pub.one".to_string()];
        assert_eq!(
            review.resolve_mentions(&dir, &mentions).unwrap_err(),
            WorkflowError::UnresolvedMention("pub.one".into())
        );

        let mentions = vec!["chair".to_string(), "@legal.head".to_string()];
        assert_eq!(
            review.resolve_mentions(&dir, &mentions).unwrap(),
            vec![
                Party::Identity(IdentityId::new("chair")),
                Party::Identity(IdentityId::new("legal.head")),
            ]
        );
    }

    #[test]
    fn test_reviewer_cannot_request_review() {
        let mut doc = document(&["DEPA"]);
        let dir = directory();
        let err = ReviewEscalation::new(3)
            .request_review(
                &mut doc,
                &Actor::new(&session("legal.head"), &dir),
                0,
                &ReviewRequest::new(["DEPB"], "question"),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted { .. }));
    }

    #[test]
    fn test_top_authority_must_confirm_append() {
        let mut doc = document(&["BOAR"]);
        let dir = directory();
        let review = ReviewEscalation::new(3);
        let ceo = session("ceo");
        let request = ReviewRequest::new(["LEGL"], "legal sign-off first");

        let err = review
            .request_review(&mut doc, &Actor::new(&ceo, &dir), 0, &request, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::ConfirmationRequired(Confirmation::AppendMentionsToChain(vec![
                "LEGL".into()
            ]))
        );
        assert_eq!(doc.approval_chain.len(), 1);

        review
            .request_review(
                &mut doc,
                &Actor::new(&ceo, &dir),
                0,
                &request.confirmed(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(doc.approval_chain.len(), 2);
        assert_eq!(doc.approval_chain[1].approver, ApproverCode::new("LEGL"));
        assert_eq!(doc.approval_chain[1].line_number, 1);
        assert_eq!(doc.approval_chain[1].action, ApprovalAction::NoAction);
    }

    #[test]
    fn test_named_reviewer_replies() {
        let mut doc = document(&["DEPA"]);
        let dir = directory();
        let review = ReviewEscalation::new(3);
        review
            .request_review(
                &mut doc,
                &Actor::new(&session("depa.head"), &dir),
                0,
                &ReviewRequest::new(["LEGL"], "ok?"),
                Utc::now(),
            )
            .unwrap();

        assert!(!doc.review_answered());
        review
            .reply(&mut doc, &Actor::new(&session("legal.head"), &dir), "fine", Utc::now())
            .unwrap();
        assert!(doc.review_answered());
        // Chain action untouched
        assert_eq!(doc.approval_chain[0].action, ApprovalAction::RequestingReview);

        let err = review
            .reply(&mut doc, &Actor::new(&session("depb.head"), &dir), "me too", Utc::now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted { .. }));
    }

    #[test]
    fn test_top_authority_position_reply_exception() {
        let mut doc = document(&["BOAR"]);
        doc.approval_chain[0].record(ApprovalAction::RequestingReview, Utc::now());
        doc.note(
            IdentityId::new("ceo"),
            NoteKind::ReviewRequest,
            "thoughts?",
            vec!["DEPA".into()],
            Utc::now(),
        );
        let dir = directory();
        let review = ReviewEscalation::new(3);
        assert!(review.can_reply(&doc, &IdentityId::new("chair"), &dir));
        assert!(review.can_reply(&doc, &IdentityId::new("senior.vp"), &dir));
        assert!(review.can_reply(&doc, &IdentityId::new("depa.head"), &dir));
        assert!(!review.can_reply(&doc, &IdentityId::new("pub.one"), &dir));
    }

    #[test]
    fn test_exception_limited_to_top_authority_position() {
        let mut doc = document(&["DEPA"]);
        doc.approval_chain[0].record(ApprovalAction::RequestingReview, Utc::now());
        doc.note(
            IdentityId::new("depa.head"),
            NoteKind::ReviewRequest,
            "thoughts?",
            vec!["LEGL".into()],
            Utc::now(),
        );
        let review = ReviewEscalation::new(3);
        assert!(!review.can_reply(&doc, &IdentityId::new("senior.vp"), &directory()));
    }

    #[test]
    fn test_reply_without_pending_review() {
        let mut doc = document(&["DEPA"]);
        let dir = directory();
        let err = ReviewEscalation::new(3)
            .reply(&mut doc, &Actor::new(&session("legal.head"), &dir), "hi", Utc::now())
            .unwrap_err();
        assert_eq!(err, WorkflowError::NoPendingReview);
    }

    #[test]
    fn test_feedback_after_review_needs_ignore_confirmation() {
        let mut doc = document(&["DEPA"]);
        let dir = directory();
        let head = session("depa.head");
        ReviewEscalation::new(3)
            .request_review(
                &mut doc,
                &Actor::new(&head, &dir),
                0,
                &ReviewRequest::new(["LEGL"], "ok?"),
                Utc::now(),
            )
            .unwrap();

        let transitions = TransitionEngine::new();
        let err = transitions
            .submit_feedback(&mut doc, &Actor::new(&head, &dir), 0, &Feedback::approve(), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::ConfirmationRequired(Confirmation::IgnoreMentioned)
        );

        transitions
            .submit_feedback(
                &mut doc,
                &Actor::new(&head, &dir),
                0,
                &Feedback::approve().ignoring_mentioned(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(doc.approval_chain[0].action, ApprovalAction::Approve);
        assert!(doc.reviewing_entry().is_none());
    }
}
