//! Common type definitions shared across layers.
//!
//! All entity IDs are UUIDs wrapped in type aliases so signatures read in domain terms:
//!
//! - [`UserId`]: user account identifier
//! - [`ClientId`]: client identifier
//! - [`ProjectId`]: project identifier
//! - [`DeliveryNoteId`]: delivery note identifier

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ClientId = Uuid;
pub type ProjectId = Uuid;
pub type DeliveryNoteId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Operations that can be refused to a caller who can see a record but does not own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Update,
    Archive,
    Recover,
    Delete,
    Invite,
    Create,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Update => "update",
            Operation::Archive => "archive",
            Operation::Recover => "recover",
            Operation::Delete => "delete",
            Operation::Invite => "invite",
            Operation::Create => "create",
        };
        f.write_str(s)
    }
}
