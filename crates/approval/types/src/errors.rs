//! Error types for the approval workflow

use crate::{DocumentNumber, DocumentStatus};

/// A confirmation the operator must give before an action is accepted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// The top authority mentioned parties that are not in the chain
    AppendMentionsToChain(Vec<String>),
    /// Mentioned reviewers have not answered yet
    IgnoreMentioned,
}

impl std::fmt::Display for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confirmation::AppendMentionsToChain(m) => {
                write!(f, "append {} to the approval chain", m.join(", "))
            }
            Confirmation::IgnoreMentioned => write!(f, "continue by ignoring mentioned"),
        }
    }
}

/// Errors that can occur in workflow operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{role} may not {operation}")]
    NotPermitted {
        role: &'static str,
        operation: &'static str,
    },

    #[error("Approval chain has moved on: line {expected} is no longer current (current: {actual:?})")]
    StaleChain { expected: u32, actual: Option<u32> },

    #[error("Invalid transition from {from}: {reason}")]
    InvalidTransition {
        from: DocumentStatus,
        reason: String,
    },

    #[error("Cannot stack review requests: line {0} is already requesting review")]
    CannotStackReview(u32),

    #[error("No review is pending")]
    NoPendingReview,

    #[error("Mention '{0}' does not resolve to an active approver code, its head account, a known superior or the top authority")]
    UnresolvedMention(String),

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(Confirmation),

    #[error("Reopen window expired: completed {elapsed_days} days ago (limit {limit_days})")]
    ReopenWindowExpired { elapsed_days: i64, limit_days: i64 },

    #[error("Approval entry not found: line {0}")]
    EntryNotFound(u32),

    #[error("Line item not found: line {0}")]
    LineItemNotFound(u32),

    #[error("Document has not been created yet")]
    NotPersisted,

    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentNumber),
}

impl WorkflowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_transition(from: DocumentStatus, reason: impl Into<String>) -> Self {
        WorkflowError::InvalidTransition {
            from,
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::Validation { .. }
                | WorkflowError::UnresolvedMention(_)
                | WorkflowError::ConfirmationRequired(_)
        )
    }

    /// Another actor advanced the document since it was loaded.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            WorkflowError::StaleChain { .. } | WorkflowError::InvalidTransition { .. }
        )
    }
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
