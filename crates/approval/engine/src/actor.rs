//! The acting party of a workflow call

use approval_types::{IdentityId, OrgDirectory, SessionContext};

/// Session plus the directory it is evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct Actor<'a> {
    pub session: &'a SessionContext,
    pub directory: &'a OrgDirectory,
}

impl<'a> Actor<'a> {
    pub fn new(session: &'a SessionContext, directory: &'a OrgDirectory) -> Self {
        Self { session, directory }
    }

    /// The identity whose standing applies (impersonation scope first).
    pub fn identity(&self) -> &'a IdentityId {
        self.session.acting()
    }
}
