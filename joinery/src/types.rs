//! Common type definitions shared across the API, database and auth layers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: signed-in user
//! - [`ProjectId`]: portfolio project
//! - [`ImageId`]: image attached to a project
//! - [`TagId`]: project tag
//! - [`MessageId`]: stored contact-form submission
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

pub type UserId = Uuid;
pub type ProjectId = Uuid;
pub type ImageId = Uuid;
pub type TagId = Uuid;
pub type MessageId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations an admin-only route performs, used in permission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

// Resources behind the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Projects,
    Images,
    Tags,
    Settings,
    Messages,
    Uploads,
    Dashboard,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Projects => write!(f, "projects"),
            Resource::Images => write!(f, "project images"),
            Resource::Tags => write!(f, "tags"),
            Resource::Settings => write!(f, "site settings"),
            Resource::Messages => write!(f, "contact messages"),
            Resource::Uploads => write!(f, "uploads"),
            Resource::Dashboard => write!(f, "admin dashboard"),
        }
    }
}
