//! Approval workflow engine
//!
//! Rules and orchestration for the ticket and delivery-note approval
//! workflow:
//! - CC chain evaluation and role derivation
//! - Status transitions, review escalation, reset-on-edit, reopen
//! - Line-item registration (split, bulk assign, update)
//! - Derived workflow state for the acting identity
//! - The backend seam, session retry, notification polling
//! - The workflow controller that ties them together

#![deny(unsafe_code)]

pub mod actor;
pub mod backend;
pub mod chain_evaluator;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod job_registration;
pub mod poller;
pub mod reopen;
pub mod reset_policy;
pub mod retry;
pub mod review;
pub mod transition;
pub mod workflow_state;

pub use actor::Actor;
pub use backend::{DocumentBackend, InMemoryBackend, SessionRefresher};
pub use chain_evaluator::{current_position, ChainEvaluator, ChainPosition, Evaluation};
pub use config::{EngineConfig, WorkflowPolicy};
pub use controller::{Loaded, WorkflowController};
pub use engine::WorkflowEngine;
pub use error::{BackendError, BackendResult, ControllerError, ControllerResult};
pub use job_registration::{transition_notes, JobRegistration};
pub use poller::{ChainSummary, NotificationPoller, PollSnapshot};
pub use reopen::ReopenPolicy;
pub use reset_policy::{assess_edit, requires_full_reset, EditImpact};
pub use retry::with_session_retry;
pub use review::ReviewEscalation;
pub use transition::TransitionEngine;
pub use workflow_state::{
    derive_workflow_state, ReviewState, WorkflowAction, WorkflowContext, WorkflowState,
};
