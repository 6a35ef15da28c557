//! Session context threaded through every workflow call

use crate::IdentityId;
use serde::{Deserialize, Serialize};

/// The authenticated principal and an optional impersonation scope.
///
/// Role derivation always uses [`SessionContext::acting`], never the raw
/// principal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub principal: IdentityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<IdentityId>,
}

impl SessionContext {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: IdentityId::new(principal),
            scope: None,
        }
    }

    /// Act as `scope` for the rest of this session.
    pub fn impersonating(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(IdentityId::new(scope));
        self
    }

    /// The identity whose standing applies to workflow operations.
    pub fn acting(&self) -> &IdentityId {
        self.scope.as_ref().unwrap_or(&self.principal)
    }

    pub fn is_impersonating(&self) -> bool {
        self.scope.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acting_prefers_scope() {
        let session = SessionContext::new("admin.ops");
        assert_eq!(session.acting().as_str(), "admin.ops");
        let scoped = session.impersonating("fina.head");
        assert_eq!(scoped.acting().as_str(), "fina.head");
        assert_eq!(scoped.principal.as_str(), "admin.ops");
        assert!(scoped.is_impersonating());
    }
}
