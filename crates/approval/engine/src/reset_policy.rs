//! Reset-on-edit policy
//!
//! Approvals given to one version of a document do not carry over to
//! changed content. When a publisher edits a document that already holds
//! at least one APPROVE and the edit touches the header, the attachment
//! content or any line item, the whole chain goes back to NO_ACTION.

use approval_types::{attachment_changed, Document, DocumentEdit, LineItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which parts of a document an edit changes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditImpact {
    pub header_changed: bool,
    pub attachment_changed: bool,
    pub line_items_changed: bool,
}

impl EditImpact {
    pub fn any(&self) -> bool {
        self.header_changed || self.attachment_changed || self.line_items_changed
    }
}

/// Compare the current document with a proposed edit.
pub fn assess_edit(before: &Document, edit: &DocumentEdit) -> EditImpact {
    EditImpact {
        header_changed: before.title != edit.title || before.recipient != edit.recipient,
        attachment_changed: attachment_changed(before.attachment.as_ref(), edit.attachment.as_ref()),
        line_items_changed: line_items_differ(&before.line_items, &edit.line_items),
    }
}

/// Whether applying `edit` must reset every chain entry.
pub fn requires_full_reset(before: &Document, edit: &DocumentEdit) -> bool {
    before.has_approval() && assess_edit(before, edit).any()
}

/// Line-number aligned structural comparison.
///
/// An added or removed line, or any changed mutable field on a line with
/// the same number, counts as a difference.
pub fn line_items_differ(before: &[LineItem], after: &[LineItem]) -> bool {
    if before.len() != after.len() {
        return true;
    }
    let by_line: BTreeMap<u32, &LineItem> = before.iter().map(|l| (l.line_number, l)).collect();
    after.iter().any(|item| match by_line.get(&item.line_number) {
        Some(prior) => !prior.same_mutable_fields(item),
        None => true,
    })
}
