//! Notifications raised by workflow transitions

use crate::{DocumentNumber, NotificationId, Party};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequired,
    RevisionRequested,
    Rejected,
    ReviewRequested,
    ReviewReplied,
    AwaitingRecipient,
    Completed,
    Reopened,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub document: DocumentNumber,
    pub addressee: Party,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        document: DocumentNumber,
        addressee: Party,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            document,
            addressee,
            kind,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
