//! API models for the contact form and stored messages.

use crate::db::models::contact_messages::{ContactMessageDBResponse, MessageStatus};
use crate::types::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_NAME_LEN: usize = 100;
pub const MIN_MESSAGE_LEN: usize = 10;
pub const MAX_MESSAGE_LEN: usize = 5000;
pub const MAX_PHONE_LEN: usize = 40;
pub const MAX_EMAIL_LEN: usize = 254;

/// A contact-form submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    /// Honeypot; real visitors leave it empty
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactMessageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MessageId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub status: MessageStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContactMessageDBResponse> for ContactMessageResponse {
    fn from(message: ContactMessageDBResponse) -> Self {
        Self {
            id: message.id,
            name: message.name,
            email: message.email,
            phone: message.phone,
            message: message.message,
            status: message.status,
            error: message.error,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

/// Validated, trimmed submission
#[derive(Debug, Clone, PartialEq)]
pub struct ValidContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
}

impl ContactRequest {
    /// True when the honeypot field was filled in
    pub fn is_spam(&self) -> bool {
        self.website.as_deref().is_some_and(|w| !w.trim().is_empty())
    }

    pub fn validate(&self) -> Result<ValidContact, String> {
        let name = self.name.trim();
        let name_len = name.chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(format!("Name must be between 1 and {MAX_NAME_LEN} characters"));
        }

        let email = self.email.trim();
        if !is_valid_email(email) {
            return Err("Please provide a valid email address".to_string());
        }

        let message = self.message.trim();
        let message_len = message.chars().count();
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&message_len) {
            return Err(format!(
                "Message must be between {MIN_MESSAGE_LEN} and {MAX_MESSAGE_LEN} characters"
            ));
        }

        let phone = self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
        if phone.is_some_and(|p| p.chars().count() > MAX_PHONE_LEN) {
            return Err("Phone number is too long".to_string());
        }

        Ok(ValidContact {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            message: message.to_string(),
        })
    }
}

/// Whether `email` is an address the mailer will accept, on a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }
    email
        .parse::<lettre::Address>()
        .is_ok_and(|address| address.domain().contains('.'))
}
