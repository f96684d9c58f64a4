//! Inbound delivery-event webhooks from the email provider.
//!
//! - [`signing`]: Standard Webhooks signature verification
//!
//! Payloads look like `{"type": "email.delivered", "data": {"email_id": "..."}}`. The id is the
//! `Message-ID` we set when sending, which is stored on the contact message.

pub mod signing;

use serde::Deserialize;

use crate::db::models::contact_messages::MessageStatus;

/// A delivery event as posted by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct EmailEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EmailEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailEventData {
    #[serde(alias = "email_id")]
    pub message_id: String,
    /// Bounce or complaint detail, when the provider sends one
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailEventType {
    Delivered,
    Bounced,
    Complained,
}

impl EmailEventType {
    /// Parse an event name; unknown names are `None` and get ignored
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "email.delivered" => Some(Self::Delivered),
            "email.bounced" => Some(Self::Bounced),
            "email.complained" => Some(Self::Complained),
            _ => None,
        }
    }

    /// Message status this event moves a contact message to
    pub fn status(self) -> MessageStatus {
        match self {
            Self::Delivered => MessageStatus::Delivered,
            Self::Bounced | Self::Complained => MessageStatus::Bounced,
        }
    }
}
