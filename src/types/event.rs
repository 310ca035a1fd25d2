use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// A row-level mutation notification delivered by the change feed.
///
/// Insert and update carry the full record after the mutation; delete carries
/// only the affected identifier. Delivery is at-least-once and unordered
/// across different identifiers, so consumers must apply these as idempotent
/// per-identifier reducers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert { after: Bookmark },
    Update { after: Bookmark },
    Delete { id: String },
}

impl ChangeEvent {
    /// Identifier of the record this event affects.
    pub fn record_id(&self) -> &str {
        match self {
            ChangeEvent::Insert { after } | ChangeEvent::Update { after } => &after.id,
            ChangeEvent::Delete { id } => id,
        }
    }

    /// Event kind as a short label, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert { .. } => "insert",
            ChangeEvent::Update { .. } => "update",
            ChangeEvent::Delete { .. } => "delete",
        }
    }
}
