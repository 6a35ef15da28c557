//! Notifications raised by a stored change

use crate::chain_evaluator::{current_position, ChainPosition};
use approval_types::{
    Document, DocumentNumber, DocumentStatus, NoteKind, Notification,
    NotificationKind, OrgDirectory, Party,
};

/// Compare the stored document before and after a write.
pub fn derive_notifications(
    number: &DocumentNumber,
    before: Option<&Document>,
    after: &Document,
    directory: &OrgDirectory,
) -> Vec<Notification> {
    let mut out = Vec::new();
    let mut push = |party: Party, kind: NotificationKind, message: String| {
        out.push(Notification::new(number.clone(), party, kind, message));
    };
    let publisher = || Party::Identity(after.originator.clone());

    let status_changed = before.map_or(true, |b| b.status != after.status);
    if status_changed {
        match after.status {
            DocumentStatus::Revision => push(
                publisher(),
                NotificationKind::RevisionRequested,
                format!("{} needs revision", number),
            ),
            DocumentStatus::Rejected => push(
                publisher(),
                NotificationKind::Rejected,
                format!("{} was rejected", number),
            ),
            DocumentStatus::AwaitingRecipient => push(
                Party::Code(after.recipient.clone()),
                NotificationKind::AwaitingRecipient,
                format!("{} is awaiting your feedback", number),
            ),
            DocumentStatus::Done => push(
                publisher(),
                NotificationKind::Completed,
                format!("{} is done", number),
            ),
            DocumentStatus::Unpublished => {}
        }
    }

    if before.is_some_and(|b| b.reopen_count < after.reopen_count) {
        push(
            publisher(),
            NotificationKind::Reopened,
            format!("{} was reopened", number),
        );
        push(
            Party::Code(after.recipient.clone()),
            NotificationKind::Reopened,
            format!("{} was reopened", number),
        );
    }

    if after.status == DocumentStatus::Unpublished {
        let holder = |doc: &Document| match current_position(&doc.approval_chain) {
            ChainPosition::Current { index, .. } => {
                let entry = &doc.approval_chain[index];
                Some(match entry.action.delegate().or(entry.delegate.as_ref()) {
                    Some(delegate) => Party::Identity(delegate.clone()),
                    None => Party::Code(entry.approver.clone()),
                })
            }
            ChainPosition::Cleared => None,
        };
        let now_holding = holder(after);
        let was_holding = before
            .filter(|b| b.status == DocumentStatus::Unpublished)
            .and_then(holder);
        if let Some(party) = now_holding.filter(|p| Some(p) != was_holding.as_ref()) {
            push(
                party,
                NotificationKind::ApprovalRequired,
                format!("{} is waiting for your approval", number),
            );
        }

        let newly_reviewing = after.reviewing_entry().is_some()
            && before.map_or(true, |b| b.reviewing_entry().is_none());
        if newly_reviewing {
            if let Some(request) = after.latest_review_request() {
                for party in request
                    .mentions
                    .iter()
                    .filter_map(|m| directory.resolve_mention(m))
                {
                    push(
                        party,
                        NotificationKind::ReviewRequested,
                        format!("{} asks for your review", number),
                    );
                }
            }
        }
    }

    let replies = |doc: &Document| {
        doc.note_log
            .iter()
            .filter(|n| n.kind == NoteKind::ReviewReply)
            .count()
    };
    if before.is_some_and(|b| replies(b) < replies(after)) {
        if let Some(entry) = after.reviewing_entry() {
            let party = match &entry.delegate {
                Some(delegate) => Party::Identity(delegate.clone()),
                None => Party::Code(entry.approver.clone()),
            };
            push(
                party,
                NotificationKind::ReviewReplied,
                format!("{} has a review reply", number),
            );
        }
    }

    out
}
