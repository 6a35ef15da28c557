//! Approval Workflow Domain Types
//!
//! Service-request tickets and goods-delivery notes share one approval
//! design: a document travels through an ordered chain of approvers who
//! act strictly in sequence, with revision loops, rejection, review
//! escalation by mention, and a bounded reopen window after completion.
//!
//! # Key Concepts
//!
//! - **Document**: the persistent aggregate. Owns its approval chain,
//!   line items and note log.
//! - **ApprovalEntry**: one position in the chain, held by an approver
//!   code (a department) and optionally handed to a delegate.
//! - **LineItem**: an individually tracked unit of work with its own
//!   WAITING/DONE lifecycle once the document is approved.
//! - **Note**: append-only log entry; some are synthetic system notes that
//!   record automatic transitions.
//! - **OrgDirectory**: who belongs to which approver code, who heads it,
//!   who reports to whom.
//! - **SessionContext**: the authenticated principal plus an optional
//!   impersonation scope. Every role derivation uses the acting identity.
//!
//! Roles are never persisted. They are derived per request from the
//! acting identity and the document.

#![deny(unsafe_code)]

mod attachment;
mod chain;
mod directory;
mod document;
mod errors;
mod ids;
mod line_item;
mod note;
mod notification;
mod role;
mod session;
mod submission;

pub use attachment::*;
pub use chain::*;
pub use directory::*;
pub use document::*;
pub use errors::*;
pub use ids::*;
pub use line_item::*;
pub use note::*;
pub use notification::*;
pub use role::*;
pub use session::*;
pub use submission::*;
