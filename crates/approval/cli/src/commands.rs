//! Subcommand bodies

use anyhow::{Context, Result};
use approval_engine::{assess_edit, derive_workflow_state, EditImpact, EngineConfig, WorkflowState};
use approval_types::{ContentHash, Document, DocumentEdit, OrgDirectory, SessionContext};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of `reset-check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub impact: EditImpact,
    pub has_approval: bool,
    pub full_reset: bool,
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn parse_instant(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid timestamp: {}", raw))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

pub fn state(
    config: &EngineConfig,
    document: &Path,
    directory: &Path,
    identity: &str,
    scope: Option<&str>,
    now: DateTime<Utc>,
) -> Result<WorkflowState> {
    let doc: Document = read_json(document)?;
    let directory: OrgDirectory = read_json(directory)?;

    let mut session = SessionContext::new(identity);
    if let Some(scope) = scope {
        session = session.impersonating(scope);
    }

    let state = derive_workflow_state(&doc, &session, &directory, &config.policy(), now);
    tracing::debug!(
        identity = %session.acting(),
        context = ?state.context,
        role = ?state.role,
        "Workflow state derived"
    );
    Ok(state)
}

pub fn reset_check(document: &Path, edit: &Path) -> Result<ResetReport> {
    let doc: Document = read_json(document)?;
    let edit: DocumentEdit = read_json(edit)?;
    Ok(report(&doc, &edit))
}

pub fn report(doc: &Document, edit: &DocumentEdit) -> ResetReport {
    let impact = assess_edit(doc, edit);
    let has_approval = doc.has_approval();
    ResetReport {
        impact,
        has_approval,
        full_reset: has_approval && impact.any(),
    }
}

pub fn hash(file: &Path) -> Result<String> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(ContentHash::hash(&bytes).to_hex())
}
