//! Job registration: the line-item sub-workflow
//!
//! Once a ticket reaches AWAITING_RECIPIENT its line items move through
//! WAITING and DONE on their own. The recipient may split a line, bulk
//! assign unassigned lines, and update assignee, target date and status.
//! A recipient delegate may update only the lines assigned to it.
//!
//! Every change to assignee, target date or status leaves a system note in
//! the line's own note log.

use crate::actor::Actor;
use crate::chain_evaluator::ChainEvaluator;
use approval_types::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct JobRegistration {
    evaluator: ChainEvaluator,
}

impl JobRegistration {
    pub fn new() -> Self {
        Self {
            evaluator: ChainEvaluator::new(),
        }
    }

    // ── Split ────────────────────────────────────────────────────────

    /// Split `line_number` in two. The copy is inserted right after the
    /// source with a fresh lifecycle; later lines are renumbered.
    ///
    /// Returns the new line's number.
    pub fn split_line(
        &self,
        doc: &mut Document,
        actor: &Actor,
        line_number: u32,
        now: DateTime<Utc>,
    ) -> WorkflowResult<u32> {
        self.require_stage(doc)?;
        self.require_recipient(doc, actor, "split a line item")?;

        let position = doc
            .line_items
            .iter()
            .position(|l| l.line_number == line_number)
            .ok_or(WorkflowError::LineItemNotFound(line_number))?;

        let source = &doc.line_items[position];
        let mut copy = LineItem::new(line_number + 1, source.description.clone(), source.quantity);
        copy.received_date = source.received_date;
        append_system_note(&mut copy.note_log, format!("Split from line {}", line_number), now);

        doc.line_items.insert(position + 1, copy);
        for (i, item) in doc.line_items.iter_mut().enumerate() {
            item.line_number = i as u32;
        }
        let new_line = line_number + 1;
        append_system_note(
            &mut doc.line_items[position].note_log,
            format!("Split into lines {} and {}", line_number, new_line),
            now,
        );
        doc.system_note(
            format!(
                "Line item {} split by {}; new line {}",
                line_number,
                actor.identity(),
                new_line
            ),
            now,
        );

        tracing::info!(
            document = %doc.label(),
            line = line_number,
            new_line,
            "Line item split"
        );
        Ok(new_line)
    }

    // ── Bulk Assign ──────────────────────────────────────────────────

    /// Write assignee, target date and status to every unassigned line.
    /// Lines that already carry an assignee or target date are left alone.
    ///
    /// Returns how many lines were assigned.
    pub fn bulk_assign(
        &self,
        doc: &mut Document,
        actor: &Actor,
        assignment: &BulkAssignment,
        now: DateTime<Utc>,
    ) -> WorkflowResult<usize> {
        self.require_stage(doc)?;
        self.require_recipient(doc, actor, "bulk assign line items")?;
        if assignment.assignee.as_str().trim().is_empty() {
            return Err(WorkflowError::validation("assignee", "assignee is required"));
        }
        if let Some(lines) = &assignment.lines {
            if let Some(missing) = lines.iter().find(|n| doc.line_item(**n).is_none()) {
                return Err(WorkflowError::LineItemNotFound(*missing));
            }
        }

        let mut assigned = 0;
        for item in &mut doc.line_items {
            let selected = assignment
                .lines
                .as_ref()
                .map_or(true, |lines| lines.contains(&item.line_number));
            if !selected || !item.is_unassigned() {
                continue;
            }
            let prior = item.clone();
            item.assignee = Some(assignment.assignee.clone());
            item.target_date = Some(assignment.target_date);
            item.status = assignment.status;
            stamp_completion(&prior, item, now);
            record_transition_notes(&prior, item, now);
            assigned += 1;
        }

        if assigned > 0 {
            doc.system_note(
                format!(
                    "{} line item(s) assigned to {} by {}",
                    assigned,
                    assignment.assignee,
                    actor.identity()
                ),
                now,
            );
        }

        tracing::info!(
            document = %doc.label(),
            assignee = %assignment.assignee,
            assigned,
            "Bulk assignment applied"
        );
        Ok(assigned)
    }

    // ── Update ───────────────────────────────────────────────────────

    /// Replace assignee, target date and status from `items`.
    ///
    /// The set of line numbers, descriptions and quantities must match the
    /// current document. Returns the number of lines that changed.
    pub fn update_line_items(
        &self,
        doc: &mut Document,
        actor: &Actor,
        items: &[LineItem],
        now: DateTime<Utc>,
    ) -> WorkflowResult<usize> {
        self.require_stage(doc)?;
        let identity = actor.identity();
        let is_recipient = actor.directory.acts_for(identity, &doc.recipient);
        let assigned_lines: Vec<u32> = doc
            .line_items
            .iter()
            .filter(|l| l.assignee.as_ref() == Some(identity))
            .map(|l| l.line_number)
            .collect();
        if !is_recipient && assigned_lines.is_empty() {
            let role = self.evaluator.evaluate(doc, identity, actor.directory).role;
            return Err(WorkflowError::NotPermitted {
                role: role_label(role),
                operation: "update line items",
            });
        }

        let incoming: BTreeMap<u32, &LineItem> = items.iter().map(|l| (l.line_number, l)).collect();
        if incoming.len() != items.len() || incoming.len() != doc.line_items.len() {
            return Err(WorkflowError::validation(
                "line_items",
                "line items must match the document's lines",
            ));
        }

        // Validate everything before touching the document.
        for current in &doc.line_items {
            let next = incoming
                .get(&current.line_number)
                .ok_or(WorkflowError::LineItemNotFound(current.line_number))?;
            if next.description != current.description || next.quantity != current.quantity {
                return Err(WorkflowError::validation(
                    "line_items",
                    format!(
                        "description and quantity of line {} cannot change here",
                        current.line_number
                    ),
                ));
            }
            let changed = !current.same_mutable_fields(next);
            if changed && !is_recipient && !assigned_lines.contains(&current.line_number) {
                return Err(WorkflowError::NotPermitted {
                    role: Role::RecipientDelegate.as_str(),
                    operation: "update a line assigned to someone else",
                });
            }
        }

        let mut changed = 0;
        for item in &mut doc.line_items {
            let Some(next) = incoming.get(&item.line_number) else {
                continue;
            };
            if item.same_mutable_fields(next) {
                continue;
            }
            let prior = item.clone();
            item.assignee = next
                .assignee
                .clone()
                .filter(|a| !a.as_str().trim().is_empty());
            item.target_date = next.target_date;
            item.status = next.status;
            stamp_completion(&prior, item, now);
            record_transition_notes(&prior, item, now);
            changed += 1;
        }

        tracing::info!(
            document = %doc.label(),
            updated_by = %identity,
            changed,
            "Line items updated"
        );
        Ok(changed)
    }

    fn require_stage(&self, doc: &Document) -> WorkflowResult<()> {
        if doc.status != DocumentStatus::AwaitingRecipient {
            return Err(WorkflowError::invalid_transition(
                doc.status,
                "line items can only change while AWAITING_RECIPIENT",
            ));
        }
        Ok(())
    }

    fn require_recipient(
        &self,
        doc: &Document,
        actor: &Actor,
        operation: &'static str,
    ) -> WorkflowResult<()> {
        let identity = actor.identity();
        if actor.directory.acts_for(identity, &doc.recipient) {
            return Ok(());
        }
        let role = self.evaluator.evaluate(doc, identity, actor.directory).role;
        Err(WorkflowError::NotPermitted {
            role: role_label(role),
            operation,
        })
    }
}

/// Describe each changed assignee, target date or status.
pub fn transition_notes(prior: &LineItem, next: &LineItem) -> Vec<String> {
    let mut notes = Vec::new();
    if prior.assignee != next.assignee {
        notes.push(format!(
            "Assignee changed from {} to {}",
            display_or_none(prior.assignee.as_ref()),
            display_or_none(next.assignee.as_ref())
        ));
    }
    if prior.target_date != next.target_date {
        notes.push(format!(
            "Target date changed from {} to {}",
            display_or_none(prior.target_date.as_ref()),
            display_or_none(next.target_date.as_ref())
        ));
    }
    if prior.status != next.status {
        notes.push(format!("Status changed from {} to {}", prior.status, next.status));
    }
    notes
}

fn record_transition_notes(prior: &LineItem, item: &mut LineItem, now: DateTime<Utc>) {
    for text in transition_notes(prior, item) {
        append_system_note(&mut item.note_log, text, now);
    }
}

fn stamp_completion(prior: &LineItem, item: &mut LineItem, now: DateTime<Utc>) {
    match (prior.status, item.status) {
        (LineItemStatus::Waiting, LineItemStatus::Done) => item.completed_date = Some(now),
        (LineItemStatus::Done, LineItemStatus::Waiting) => item.completed_date = None,
        _ => {}
    }
}

fn display_or_none<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "(none)".to_string(), ToString::to_string)
}
