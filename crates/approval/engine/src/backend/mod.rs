//! Backend layer for the approval workflow
//!
//! The document store is an external collaborator. [`DocumentBackend`] is
//! the seam; [`InMemoryBackend`] implements it for tests and offline use.

mod memory;
mod notify;
mod traits;

pub use memory::InMemoryBackend;
pub use notify::derive_notifications;
pub use traits::{DocumentBackend, SessionRefresher};
