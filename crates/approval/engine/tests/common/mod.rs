//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use approval_engine::{InMemoryBackend, WorkflowController, WorkflowEngine};
use approval_types::*;
use std::sync::Arc;

pub const PUBLISHER: &str = "pub.one";
pub const DEPA_HEAD: &str = "depa.head";
pub const DEPB_HEAD: &str = "depb.head";
pub const LEGAL_HEAD: &str = "legal.head";
pub const RECIPIENT_HEAD: &str = "itsv.head";
pub const CONTRACTOR: &str = "contractor.one";

pub fn directory() -> OrgDirectory {
    OrgDirectory::new()
        .with_code("DEPA", Some(DEPA_HEAD))
        .with_code("DEPB", Some(DEPB_HEAD))
        .with_code("LEGL", Some(LEGAL_HEAD))
        .with_code("ITSV", Some(RECIPIENT_HEAD))
        .with_person(PUBLISHER, None, 1)
        .with_person(CONTRACTOR, None, 1)
}

pub fn session(identity: &str) -> SessionContext {
    SessionContext::new(identity)
}

pub fn draft(kind: DocumentKind) -> Document {
    Document::draft(
        kind,
        "Laptop refresh",
        IdentityId::new(PUBLISHER),
        ApproverCode::new("ITSV"),
    )
    .with_approver("DEPA")
    .with_approver("DEPB")
    .with_line_item("Laptop", 2)
    .with_line_item("Docking station", 2)
}

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub controller: WorkflowController,
}

impl Harness {
    pub fn new() -> Self {
        let directory = Arc::new(directory());
        let backend = Arc::new(InMemoryBackend::new(
            WorkflowEngine::default(),
            directory.clone(),
        ));
        let controller = WorkflowController::new(
            WorkflowEngine::default(),
            directory,
            backend.clone(),
            backend.clone(),
        );
        Self {
            backend,
            controller,
        }
    }

    /// Create `kind` as the publisher and return its number.
    pub async fn publish(&self, kind: DocumentKind) -> DocumentNumber {
        let loaded = self
            .controller
            .create(&session(PUBLISHER), draft(kind), None)
            .await
            .unwrap();
        loaded.document.number.unwrap()
    }

    pub async fn approve(&self, identity: &str, number: &DocumentNumber, line: u32) -> Document {
        self.controller
            .submit_approval(&session(identity), number, line, Feedback::approve())
            .await
            .unwrap()
            .document
    }

    pub async fn stored(&self, number: &DocumentNumber) -> Document {
        self.backend.snapshot(number).await.unwrap()
    }
}
