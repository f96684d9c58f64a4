//! Database record models matching table schemas.
//!
//! Models are distinct from the API models in [`crate::api::models`] so storage and the wire
//! format can change independently. Response types derive `sqlx::FromRow` and are read with
//! runtime-checked `query_as`.
//!
//! - [`projects`]: portfolio projects and their tag links
//! - [`project_images`]: images hosted on the media host
//! - [`tags`]: tags and per-tag project counts
//! - [`site_settings`]: editable site copy
//! - [`users`]: signed-in users and identity-provider profiles
//! - [`contact_messages`]: contact-form submissions and delivery state

pub mod contact_messages;
pub mod project_images;
pub mod projects;
pub mod site_settings;
pub mod tags;
pub mod users;
