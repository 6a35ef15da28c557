//! Line items: units of work with their own lifecycle

use crate::{IdentityId, Note};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemStatus {
    Waiting,
    Done,
}

impl std::fmt::Display for LineItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineItemStatus::Waiting => write!(f, "WAITING"),
            LineItemStatus::Done => write!(f, "DONE"),
        }
    }
}

/// An individually tracked unit of work within a document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_number: u32,
    pub description: String,
    pub quantity: u32,
    pub status: LineItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note_log: Vec<Note>,
}

impl LineItem {
    pub fn new(line_number: u32, description: impl Into<String>, quantity: u32) -> Self {
        Self {
            line_number,
            description: description.into(),
            quantity,
            status: LineItemStatus::Waiting,
            assignee: None,
            target_date: None,
            received_date: None,
            completed_date: None,
            note_log: Vec::new(),
        }
    }

    pub fn with_assignee(mut self, assignee: IdentityId) -> Self {
        self.assignee = Some(assignee);
        self
    }

    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    pub fn with_status(mut self, status: LineItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == LineItemStatus::Done
    }

    /// No assignee (or a blank one) and no target date.
    pub fn is_unassigned(&self) -> bool {
        let no_assignee = self
            .assignee
            .as_ref()
            .map_or(true, |a| a.as_str().trim().is_empty());
        no_assignee && self.target_date.is_none()
    }

    /// Compare the fields a publisher or recipient can change.
    ///
    /// Dates stamped by the system and the note log are ignored.
    pub fn same_mutable_fields(&self, other: &LineItem) -> bool {
        self.line_number == other.line_number
            && self.description == other.description
            && self.quantity == other.quantity
            && self.status == other.status
            && self.assignee == other.assignee
            && self.target_date == other.target_date
    }

    /// Status, assignment, stamped dates and notes all match `other`.
    pub fn same_lifecycle(&self, other: &LineItem) -> bool {
        self.status == other.status
            && self.assignee == other.assignee
            && self.target_date == other.target_date
            && self.received_date == other.received_date
            && self.completed_date == other.completed_date
            && self.note_log == other.note_log
    }

    /// Waiting and unassigned, with no dates or notes yet.
    pub fn is_fresh(&self) -> bool {
        self.status == LineItemStatus::Waiting
            && self.assignee.is_none()
            && self.target_date.is_none()
            && self.received_date.is_none()
            && self.completed_date.is_none()
            && self.note_log.is_empty()
    }
}
