//! End-to-end workflow scenarios through the controller and the
//! in-memory backend.

mod common;

use approval_engine::{ControllerError, WorkflowAction, WorkflowContext};
use approval_types::*;
use chrono::{Duration, NaiveDate, Utc};
use common::*;

#[tokio::test]
async fn test_first_approval_advances_chain() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;

    let doc = h.approve(DEPA_HEAD, &number, 0).await;

    assert_eq!(doc.approval_chain[0].action, ApprovalAction::Approve);
    assert_eq!(doc.approval_chain[1].action, ApprovalAction::NoAction);
    assert_eq!(doc.status, DocumentStatus::Unpublished);

    let next = h
        .controller
        .load(&session(DEPB_HEAD), &number)
        .await
        .unwrap();
    assert_eq!(next.state.context, WorkflowContext::ApprovalFeedback { index: 1 });
    assert_eq!(next.state.position.line_number(), Some(1));
}

#[tokio::test]
async fn test_final_approval_on_ticket_awaits_recipient() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;
    h.approve(DEPA_HEAD, &number, 0).await;

    let before = Utc::now();
    let doc = h.approve(DEPB_HEAD, &number, 1).await;

    assert_eq!(doc.status, DocumentStatus::AwaitingRecipient);
    let received = doc.received_at.unwrap();
    assert!(received >= before);
    assert!(doc.completed_at.is_none());
    assert!(doc.line_items.iter().all(|l| l.received_date == Some(received)));
}

#[tokio::test]
async fn test_final_approval_on_delivery_note_completes() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::DeliveryNote).await;
    assert!(number.as_str().starts_with("DN-"));
    h.approve(DEPA_HEAD, &number, 0).await;

    let doc = h.approve(DEPB_HEAD, &number, 1).await;

    assert_eq!(doc.status, DocumentStatus::Done);
    assert!(doc.completed_at.is_some());
    assert!(doc.received_at.is_none());
}

#[tokio::test]
async fn test_edit_after_approval_resets_whole_chain() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;
    let approved = h.approve(DEPA_HEAD, &number, 0).await;

    let mut edit = DocumentEdit::from_document(&approved);
    edit.line_items[1].quantity = 3;
    let revision = RevisionSubmission {
        edit,
        done_revising: false,
        note: None,
    };
    let doc = h
        .controller
        .edit(&session(PUBLISHER), &number, revision, None)
        .await
        .unwrap()
        .document;

    assert!(doc
        .approval_chain
        .iter()
        .all(|e| e.action == ApprovalAction::NoAction));
    assert_eq!(doc.status, DocumentStatus::Unpublished);
    assert_eq!(doc.line_items[1].quantity, 3);
}

#[tokio::test]
async fn test_reopen_outside_window_rejected() {
    let h = Harness::new();
    let mut done = draft(DocumentKind::Ticket);
    for entry in &mut done.approval_chain {
        entry.record(ApprovalAction::Approve, Utc::now() - Duration::days(45));
    }
    done.status = DocumentStatus::Done;
    done.completed_at = Some(Utc::now() - Duration::days(40));
    let number = h.backend.insert_document(done).await.unwrap();

    let loaded = h
        .controller
        .load(&session(PUBLISHER), &number)
        .await
        .unwrap();
    assert_eq!(loaded.state.context, WorkflowContext::Terminal);
    assert!(!loaded.state.allows(WorkflowAction::Reopen));

    let err = h
        .controller
        .reopen(&session(PUBLISHER), &number, Role::Publisher)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Rejected(WorkflowError::ReopenWindowExpired { limit_days: 30, .. })
    ));
    assert_eq!(h.stored(&number).await.status, DocumentStatus::Done);
}

#[tokio::test]
async fn test_reopen_inside_window_restores_status() {
    let h = Harness::new();
    let mut done = draft(DocumentKind::Ticket);
    for entry in &mut done.approval_chain {
        entry.record(ApprovalAction::Approve, Utc::now() - Duration::days(12));
    }
    done.status = DocumentStatus::Done;
    done.pre_completion_status = Some(DocumentStatus::AwaitingRecipient);
    done.completed_at = Some(Utc::now() - Duration::days(10));
    let number = h.backend.insert_document(done).await.unwrap();

    let loaded = h
        .controller
        .reopen(&session(RECIPIENT_HEAD), &number, Role::Recipient)
        .await
        .unwrap();

    assert_eq!(loaded.document.status, DocumentStatus::AwaitingRecipient);
    assert_eq!(loaded.document.reopen_count, 1);
    assert!(loaded.document.completed_at.is_none());
    assert_eq!(loaded.state.context, WorkflowContext::RecipientFeedback);
}

#[tokio::test]
async fn test_empty_chain_delivery_note_stays_done() {
    let h = Harness::new();
    let mut note = draft(DocumentKind::DeliveryNote);
    note.approval_chain.clear();

    let created = h
        .controller
        .create(&session(PUBLISHER), note, None)
        .await
        .unwrap();
    assert_eq!(created.document.status, DocumentStatus::Done);
    assert!(!created.state.allows(WorkflowAction::Reopen));
    let number = created.document.number.clone().unwrap();

    let err = h
        .controller
        .reopen(&session(PUBLISHER), &number, Role::Publisher)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Rejected(WorkflowError::InvalidTransition { .. })
    ));
    assert_eq!(h.stored(&number).await.status, DocumentStatus::Done);
}

#[tokio::test]
async fn test_second_review_request_cannot_stack() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;
    h.controller
        .request_review(
            &session(DEPA_HEAD),
            &number,
            0,
            ReviewRequest::new(["LEGL"], "Is the warranty covered?"),
        )
        .await
        .unwrap();
    let before = h.stored(&number).await;
    let calls = h.backend.call_count();

    let err = h
        .controller
        .request_review(
            &session(DEPA_HEAD),
            &number,
            0,
            ReviewRequest::new(["DEPB"], "And the budget?"),
        )
        .await
        .unwrap_err();

    assert_eq!(err, ControllerError::Rejected(WorkflowError::CannotStackReview(0)));
    assert_eq!(h.stored(&number).await, before);
    // Only the load reached the backend
    assert_eq!(h.backend.call_count(), calls + 1);
    assert_eq!(before.reviewing_entries().count(), 1);
}

#[tokio::test]
async fn test_review_reply_then_approve() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;
    h.controller
        .request_review(
            &session(DEPA_HEAD),
            &number,
            0,
            ReviewRequest::new(["LEGL"], "Is the warranty covered?"),
        )
        .await
        .unwrap();

    // Approving before the reviewer answers needs confirmation
    let err = h
        .controller
        .submit_approval(&session(DEPA_HEAD), &number, 0, Feedback::approve())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ControllerError::Validation(WorkflowError::ConfirmationRequired(
            Confirmation::IgnoreMentioned
        ))
    );

    let reviewer = h
        .controller
        .load(&session(LEGAL_HEAD), &number)
        .await
        .unwrap();
    assert_eq!(reviewer.state.context, WorkflowContext::ReviewReply { index: 0 });
    assert!(reviewer.state.allows(WorkflowAction::ReplyForReview));

    let replied = h
        .controller
        .reply_for_review(&session(LEGAL_HEAD), &number, "Two years on-site".into())
        .await
        .unwrap();
    assert!(replied.document.review_answered());

    let notes = h
        .controller
        .notifications(&session(DEPA_HEAD))
        .await
        .unwrap();
    assert!(notes.iter().any(|n| n.kind == NotificationKind::ReviewReplied));

    let doc = h.approve(DEPA_HEAD, &number, 0).await;
    assert_eq!(doc.approval_chain[0].action, ApprovalAction::Approve);
    assert!(doc.reviewing_entry().is_none());
}

#[tokio::test]
async fn test_stale_position_rejected() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;

    let err = h
        .controller
        .submit_approval(&session(DEPB_HEAD), &number, 1, Feedback::approve())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ControllerError::Rejected(WorkflowError::StaleChain {
            expected: 1,
            actual: Some(0)
        })
    ));
}

#[tokio::test]
async fn test_revision_round_trip() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;
    h.approve(DEPA_HEAD, &number, 0).await;

    let missing_comment = h
        .controller
        .submit_approval(
            &session(DEPB_HEAD),
            &number,
            1,
            Feedback::new(FeedbackAction::Revision),
        )
        .await
        .unwrap_err();
    assert!(matches!(missing_comment, ControllerError::Validation(_)));

    let flagged = h
        .controller
        .submit_approval(
            &session(DEPB_HEAD),
            &number,
            1,
            Feedback::revision("Quote the docking stations separately"),
        )
        .await
        .unwrap();
    assert_eq!(flagged.document.status, DocumentStatus::Revision);

    let publisher = h
        .controller
        .load(&session(PUBLISHER), &number)
        .await
        .unwrap();
    assert_eq!(publisher.state.context, WorkflowContext::Revision);

    let revision = RevisionSubmission {
        edit: DocumentEdit::from_document(&publisher.document),
        done_revising: false,
        note: Some("Quote attached".into()),
    };
    let doc = h
        .controller
        .finish_revision(&session(PUBLISHER), &number, revision, None)
        .await
        .unwrap()
        .document;

    assert_eq!(doc.status, DocumentStatus::Unpublished);
    assert_eq!(doc.approval_chain[0].action, ApprovalAction::Approve);
    assert_eq!(doc.approval_chain[1].action, ApprovalAction::NoAction);
}

#[tokio::test]
async fn test_ticket_through_recipient_to_done() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;
    h.approve(DEPA_HEAD, &number, 0).await;
    h.approve(DEPB_HEAD, &number, 1).await;

    let recipient = session(RECIPIENT_HEAD);
    let split = h
        .controller
        .split_line(&recipient, &number, 0)
        .await
        .unwrap();
    assert_eq!(split.document.line_items.len(), 3);

    let assigned = h
        .controller
        .bulk_assign(
            &recipient,
            &number,
            BulkAssignment {
                assignee: IdentityId::new(CONTRACTOR),
                target_date: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
                status: LineItemStatus::Waiting,
                lines: None,
            },
        )
        .await
        .unwrap();
    assert!(assigned
        .document
        .line_items
        .iter()
        .all(|l| l.assignee == Some(IdentityId::new(CONTRACTOR))));

    // Not every line is done yet
    let early = h
        .controller
        .recipient_feedback(
            &recipient,
            &number,
            RecipientFeedback::new(RecipientDecision::Done),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        early,
        ControllerError::Rejected(WorkflowError::InvalidTransition { .. })
    ));

    let contractor = session(CONTRACTOR);
    let mine = h.controller.load(&contractor, &number).await.unwrap();
    assert_eq!(mine.state.role, Some(Role::RecipientDelegate));
    let mut items = mine.document.line_items.clone();
    for item in &mut items {
        item.status = LineItemStatus::Done;
    }
    let updated = h
        .controller
        .update_line_items(&contractor, &number, items)
        .await
        .unwrap();
    assert!(updated.document.all_items_done());
    assert!(updated
        .document
        .line_items
        .iter()
        .all(|l| l.completed_date.is_some()));

    let done = h
        .controller
        .recipient_feedback(
            &recipient,
            &number,
            RecipientFeedback::new(RecipientDecision::Done),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(done.document.status, DocumentStatus::Done);
    assert_eq!(done.state.context, WorkflowContext::ReopenableDone);

    let notes = h
        .controller
        .notifications(&session(PUBLISHER))
        .await
        .unwrap();
    assert!(notes.iter().any(|n| n.kind == NotificationKind::Completed));
}

#[tokio::test]
async fn test_delegate_acts_on_entry() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;

    let delegated = h
        .controller
        .delegate(&session(DEPA_HEAD), &number, 0, IdentityId::new(CONTRACTOR))
        .await
        .unwrap();
    assert_eq!(
        delegated.document.approval_chain[0].delegate,
        Some(IdentityId::new(CONTRACTOR))
    );

    let pic = h
        .controller
        .load(&session(CONTRACTOR), &number)
        .await
        .unwrap();
    assert_eq!(pic.state.role, Some(Role::ApproverDelegate));
    assert!(pic.state.allows(WorkflowAction::Approve));

    let doc = h.approve(CONTRACTOR, &number, 0).await;
    assert_eq!(doc.approval_chain[0].action, ApprovalAction::Approve);
}

#[tokio::test]
async fn test_impersonation_uses_scope() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;

    let acting = SessionContext::new("admin.one").impersonating(DEPA_HEAD);
    let loaded = h.controller.load(&acting, &number).await.unwrap();
    assert_eq!(loaded.state.role, Some(Role::Approver));

    let doc = h
        .controller
        .submit_approval(&acting, &number, 0, Feedback::approve())
        .await
        .unwrap()
        .document;
    assert_eq!(doc.approval_chain[0].action, ApprovalAction::Approve);
}

#[tokio::test]
async fn test_notifications_follow_the_chain() {
    let h = Harness::new();
    let number = h.publish(DocumentKind::Ticket).await;

    let first = h
        .controller
        .notifications(&session(DEPA_HEAD))
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, NotificationKind::ApprovalRequired);

    h.approve(DEPA_HEAD, &number, 0).await;
    let second = h
        .controller
        .notifications(&session(DEPB_HEAD))
        .await
        .unwrap();
    assert!(second
        .iter()
        .any(|n| n.kind == NotificationKind::ApprovalRequired && n.document == number));

    let dismissed = h
        .controller
        .dismiss_notification(&session(DEPA_HEAD), &number)
        .await
        .unwrap();
    assert_eq!(dismissed, 1);
    assert!(h
        .controller
        .notifications(&session(DEPA_HEAD))
        .await
        .unwrap()
        .is_empty());
}
