//! API models for site settings.
//!
//! Settings are a flat string map. Only the keys in [`KNOWN_SETTINGS`] may be written; reads
//! merge the stored values over the defaults, so every known key is always present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::contact::is_valid_email;

/// Known keys and their defaults
pub const KNOWN_SETTINGS: &[(&str, &str)] = &[
    ("site_title", "Joinery"),
    ("hero_heading", "Bespoke joinery, built to last"),
    ("hero_subheading", "Kitchens, staircases, fitted furniture and restoration work."),
    ("about_text", "We are a small workshop making and fitting bespoke timber work."),
    ("contact_email", ""),
    ("contact_phone", ""),
    ("service_area", ""),
];

/// Longest accepted setting value
pub const MAX_SETTING_LEN: usize = 10_000;

/// Site settings keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SiteSettings(pub BTreeMap<String, String>);

impl SiteSettings {
    /// Stored values over the defaults
    pub fn with_defaults(stored: BTreeMap<String, String>) -> Self {
        let mut settings: BTreeMap<String, String> =
            KNOWN_SETTINGS.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        settings.extend(stored);
        Self(settings)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// A setting that is set to something non-blank
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

fn is_known(key: &str) -> bool {
    KNOWN_SETTINGS.iter().any(|(known, _)| *known == key)
}

/// Check an update: known keys only, bounded values, and a plausible contact email.
/// Values are trimmed.
pub fn validate_update(update: SiteSettings) -> Result<BTreeMap<String, String>, String> {
    if update.0.is_empty() {
        return Err("No settings given".to_string());
    }

    let mut values = BTreeMap::new();
    for (key, value) in update.0 {
        if !is_known(&key) {
            return Err(format!("Unknown setting '{key}'"));
        }
        let value = value.trim().to_string();
        if value.chars().count() > MAX_SETTING_LEN {
            return Err(format!("Setting '{key}' is too long"));
        }
        if key == "contact_email" && !value.is_empty() && !is_valid_email(&value) {
            return Err("contact_email must be a valid email address".to_string());
        }
        values.insert(key, value);
    }
    Ok(values)
}
