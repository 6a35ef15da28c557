//! Derived caller roles. Never persisted.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Publisher,
    PublisherDeptHead,
    Recipient,
    RecipientDelegate,
    Approver,
    ApproverDelegate,
    Reviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Publisher => "publisher",
            Role::PublisherDeptHead => "publisher_dept_head",
            Role::Recipient => "recipient",
            Role::RecipientDelegate => "recipient_delegate",
            Role::Approver => "approver",
            Role::ApproverDelegate => "approver_delegate",
            Role::Reviewer => "reviewer",
        }
    }

    /// Holds the current chain position.
    pub fn is_chain_actor(&self) -> bool {
        matches!(self, Role::Approver | Role::ApproverDelegate)
    }

    pub fn is_recipient_side(&self) -> bool {
        matches!(self, Role::Recipient | Role::RecipientDelegate)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Label for an optional role; `None` means no standing.
pub fn role_label(role: Option<Role>) -> &'static str {
    role.map_or("no standing", |r| r.as_str())
}
