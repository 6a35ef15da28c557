//! Identifiers shared across the approval domain

use serde::{Deserialize, Serialize};

/// Length of a department approver code, e.g. `FINA`.
pub const APPROVER_CODE_LEN: usize = 4;

/// Author recorded on synthetic notes.
pub const SYSTEM_AUTHOR: &str = "system";

// ── Document Number ──────────────────────────────────────────────────

/// Number assigned to a document by the backing store on creation
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentNumber(pub String);

impl DocumentNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Identity ─────────────────────────────────────────────────────────

/// A full personal identity (employee account)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The author used for synthetic notes.
    pub fn system() -> Self {
        Self(SYSTEM_AUTHOR.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_AUTHOR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Approver Code ────────────────────────────────────────────────────

/// A department code that holds a position in an approval chain
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApproverCode(pub String);

impl ApproverCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Whether a raw string has the shape of an approver code:
    /// exactly four ASCII alphanumerics.
    pub fn is_code_shaped(raw: &str) -> bool {
        raw.len() == APPROVER_CODE_LEN && raw.chars().all(|c| c.is_ascii_alphanumeric())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ApproverCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Notification Identifier ──────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
