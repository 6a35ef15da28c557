//! Error types for the backend seam and the workflow controller

use approval_types::{DocumentNumber, WorkflowError};
use thiserror::Error;

/// Failures reported by the document backend
///
/// Every backend call surfaces one of three transport signals, a typed
/// rejection from server-side re-validation, or a missing document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The session token has expired; refresh and retry once
    #[error("Session expired")]
    SessionExpired,

    /// The caller is not authorised; the session must be re-established
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generic failure; the user may resubmit
    #[error("Backend failure: {0}")]
    Failure(String),

    /// The backend re-ran the workflow rules and refused the change
    #[error("Rejected: {0}")]
    Rejected(#[from] WorkflowError),

    #[error("Document not found: {0}")]
    NotFound(DocumentNumber),
}

impl BackendError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, BackendError::SessionExpired)
    }
}

/// Result type alias for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// What the controller reports to its caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// Blocked before anything was sent
    #[error("Validation error: {0}")]
    Validation(WorkflowError),

    /// Authorisation failed even after a session refresh
    #[error("Re-authentication required")]
    ReauthenticationRequired,

    /// Transient failure; resubmit manually
    #[error("Request failed, please retry: {message}")]
    Retryable { message: String },

    /// The workflow refused the change (no standing, stale chain, ...)
    #[error("{0}")]
    Rejected(WorkflowError),

    #[error("Document not found: {0}")]
    NotFound(DocumentNumber),
}

impl ControllerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::Retryable { .. })
    }

    /// The underlying workflow error, if the failure was a rule violation.
    pub fn workflow_error(&self) -> Option<&WorkflowError> {
        match self {
            ControllerError::Validation(err) | ControllerError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WorkflowError> for ControllerError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::DocumentNotFound(number) => ControllerError::NotFound(number),
            err if err.is_validation() => ControllerError::Validation(err),
            err => ControllerError::Rejected(err),
        }
    }
}

impl From<BackendError> for ControllerError {
    fn from(err: BackendError) -> Self {
        match err {
            // Still expired after the single refresh-and-retry
            BackendError::SessionExpired | BackendError::Unauthorized(_) => {
                ControllerError::ReauthenticationRequired
            }
            BackendError::Failure(message) => ControllerError::Retryable { message },
            BackendError::Rejected(err) => err.into(),
            BackendError::NotFound(number) => ControllerError::NotFound(number),
        }
    }
}

/// Result type alias for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;
