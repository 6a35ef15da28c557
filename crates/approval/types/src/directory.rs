//! Organisation directory: approver codes, their heads, and reporting lines
//!
//! Mentions are raw strings typed by users. They resolve against the
//! directory with a fixed precedence:
//!
//! 1. a known personal identity (directory person or any code's head account)
//! 2. an active approver code (four ASCII alphanumerics)
//!
//! A string that is both a known identity and an active code names only the
//! identity. Members of the same-named code are not reached by it.

use crate::{ApproverCode, IdentityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Something a mention or notification can be addressed to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Identity(IdentityId),
    Code(ApproverCode),
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Party::Identity(id) => write!(f, "{}", id),
            Party::Code(code) => write!(f, "{}", code),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    /// The designated head account for this code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<IdentityId>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ApproverCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior: Option<IdentityId>,
    #[serde(default)]
    pub seniority: u8,
}

fn default_true() -> bool {
    true
}

/// Lookup tables for identities and approver codes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDirectory {
    #[serde(default)]
    pub codes: BTreeMap<ApproverCode, CodeEntry>,
    #[serde(default)]
    pub people: BTreeMap<IdentityId, PersonEntry>,
    /// The designated top-level authority, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_authority: Option<IdentityId>,
}

impl OrgDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an approver code with its head account.
    pub fn with_code(mut self, code: impl Into<String>, head: Option<&str>) -> Self {
        let code = ApproverCode::new(code);
        let head = head.map(IdentityId::new);
        if let Some(head) = &head {
            self.people.entry(head.clone()).or_default().code = Some(code.clone());
        }
        self.codes.insert(code, CodeEntry { head, active: true });
        self
    }

    /// Register a person belonging to `code`.
    pub fn with_person(mut self, id: &str, code: Option<&str>, seniority: u8) -> Self {
        let entry = self.people.entry(IdentityId::new(id)).or_default();
        entry.code = code.map(ApproverCode::new);
        entry.seniority = seniority;
        self
    }

    pub fn with_superior(mut self, id: &str, superior: &str) -> Self {
        self.people.entry(IdentityId::new(id)).or_default().superior =
            Some(IdentityId::new(superior));
        self
    }

    pub fn with_top_authority(mut self, id: &str) -> Self {
        self.top_authority = Some(IdentityId::new(id));
        self
    }

    pub fn deactivate(mut self, code: &str) -> Self {
        if let Some(entry) = self.codes.get_mut(&ApproverCode::new(code)) {
            entry.active = false;
        }
        self
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn code_of(&self, id: &IdentityId) -> Option<&ApproverCode> {
        self.people.get(id).and_then(|p| p.code.as_ref())
    }

    pub fn head_of(&self, code: &ApproverCode) -> Option<&IdentityId> {
        self.codes.get(code).and_then(|c| c.head.as_ref())
    }

    pub fn superior_of(&self, id: &IdentityId) -> Option<&IdentityId> {
        self.people.get(id).and_then(|p| p.superior.as_ref())
    }

    pub fn seniority_of(&self, id: &IdentityId) -> u8 {
        self.people.get(id).map_or(0, |p| p.seniority)
    }

    pub fn is_active_code(&self, code: &ApproverCode) -> bool {
        self.codes.get(code).is_some_and(|c| c.active)
    }

    /// A person in the directory or the head account of any code.
    pub fn is_known_identity(&self, id: &IdentityId) -> bool {
        self.people.contains_key(id) || self.codes.values().any(|c| c.head.as_ref() == Some(id))
    }

    /// An identity a review mention may name: the head account of an active
    /// code, someone's configured superior, or the top authority.
    pub fn is_mentionable_identity(&self, id: &IdentityId) -> bool {
        self.codes
            .values()
            .any(|c| c.active && c.head.as_ref() == Some(id))
            || self.people.values().any(|p| p.superior.as_ref() == Some(id))
            || self.is_top_authority(id)
    }

    pub fn is_top_authority(&self, id: &IdentityId) -> bool {
        self.top_authority.as_ref() == Some(id)
    }

    /// The code held by the top authority, if it has one.
    pub fn top_authority_code(&self) -> Option<&ApproverCode> {
        self.top_authority.as_ref().and_then(|id| self.code_of(id))
    }

    /// Whether `id` acts for `code`: a member of it or its head account.
    pub fn acts_for(&self, id: &IdentityId, code: &ApproverCode) -> bool {
        self.code_of(id) == Some(code) || self.head_of(code) == Some(id)
    }

    // ── Mentions ─────────────────────────────────────────────────────

    /// Resolve a raw mention to a mentionable identity or an active code.
    /// Identity matches win over code matches.
    pub fn resolve_mention(&self, raw: &str) -> Option<Party> {
        let raw = raw.trim().trim_start_matches('@');
        if raw.is_empty() {
            return None;
        }
        let id = IdentityId::new(raw);
        if self.is_mentionable_identity(&id) {
            return Some(Party::Identity(id));
        }
        if ApproverCode::is_code_shaped(raw) {
            let code = ApproverCode::new(raw);
            if self.is_active_code(&code) {
                return Some(Party::Code(code));
            }
        }
        None
    }

    /// Whether `party` addresses `id`.
    pub fn names(&self, party: &Party, id: &IdentityId) -> bool {
        match party {
            Party::Identity(target) => target == id,
            Party::Code(code) => self.acts_for(id, code),
        }
    }

    /// Whether any of the raw mentions addresses `id`.
    pub fn mentioned(&self, mentions: &[String], id: &IdentityId) -> bool {
        mentions
            .iter()
            .filter_map(|m| self.resolve_mention(m))
            .any(|party| self.names(&party, id))
    }

    /// The approver code a resolved party would occupy in a chain.
    pub fn chain_code_of(&self, party: &Party) -> Option<ApproverCode> {
        match party {
            Party::Code(code) => Some(code.clone()),
            Party::Identity(id) => self.code_of(id).cloned(),
        }
    }
}
