//! Database models for contact-form submissions.

use crate::types::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Delivery state of a contact message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Stored, not yet handed to the mail server
    Pending,
    /// Accepted by the mail server
    Sent,
    /// The mail server refused it
    Failed,
    /// Provider reported delivery
    Delivered,
    /// Provider reported a bounce or complaint
    Bounced,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Bounced => "bounced",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "failed" => Ok(MessageStatus::Failed),
            "delivered" => Ok(MessageStatus::Delivered),
            "bounced" => Ok(MessageStatus::Bounced),
            other => Err(format!("unknown message status '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContactMessageCreateDBRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
}

/// Row as stored; `status` is kept as text in the table
#[derive(Debug, Clone, FromRow)]
pub struct ContactMessageRow {
    pub id: MessageId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContactMessageDBResponse {
    pub id: MessageId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ContactMessageRow> for ContactMessageDBResponse {
    type Error = String;

    fn try_from(row: ContactMessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            message: row.message,
            status: row.status.parse()?,
            provider_message_id: row.provider_message_id,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::Sent,
            MessageStatus::Failed,
            MessageStatus::Delivered,
            MessageStatus::Bounced,
        ] {
            assert_eq!(status.as_str().parse::<MessageStatus>(), Ok(status));
        }
        assert!("lost".parse::<MessageStatus>().is_err());
    }
}
