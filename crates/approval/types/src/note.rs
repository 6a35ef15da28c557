//! Append-only note log

use crate::IdentityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What produced a note
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Free text written by a person
    Comment,
    /// Synthetic record of an automatic transition
    System,
    /// Opens a review escalation; carries the mention list
    ReviewRequest,
    /// A mentioned party answering a review request
    ReviewReply,
}

/// A single log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub line_number: u32,
    pub timestamp: DateTime<Utc>,
    pub author: IdentityId,
    pub kind: NoteKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

impl Note {
    pub fn is_system(&self) -> bool {
        self.kind == NoteKind::System
    }
}

/// Append a note, keeping line numbers dense and timestamps monotonic.
///
/// A timestamp earlier than the last entry is clamped to it.
pub fn append_note(
    log: &mut Vec<Note>,
    author: IdentityId,
    kind: NoteKind,
    text: impl Into<String>,
    mentions: Vec<String>,
    at: DateTime<Utc>,
) -> u32 {
    let line_number = log.len() as u32;
    let timestamp = match log.last() {
        Some(last) if last.timestamp > at => last.timestamp,
        _ => at,
    };
    log.push(Note {
        line_number,
        timestamp,
        author,
        kind,
        text: text.into(),
        mentions,
    });
    line_number
}

/// Append a synthetic note authored by `system`.
pub fn append_system_note(log: &mut Vec<Note>, text: impl Into<String>, at: DateTime<Utc>) -> u32 {
    append_note(log, IdentityId::system(), NoteKind::System, text, Vec::new(), at)
}

/// Whether line numbers are dense and timestamps never go backwards.
pub fn is_monotonic(log: &[Note]) -> bool {
    log.iter().enumerate().all(|(i, n)| n.line_number == i as u32)
        && log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
