//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or a transaction) and
//! returns models from [`crate::db::models`]. The CRUD entities implement [`Repository`];
//! entity-specific operations are inherent methods.
//!
//! # Available Repositories
//!
//! - [`Projects`]: projects, their tags and the per-day display order
//! - [`ProjectImages`]: images, their order and the cover flag
//! - [`Tags`]: tags and published project counts
//! - [`SiteSettings`]: key/value site settings
//! - [`Users`]: users created by sign-in, admin bootstrap
//! - [`ContactMessages`]: contact-form submissions and delivery state

pub mod contact_messages;
pub mod project_images;
pub mod projects;
pub mod repository;
pub mod site_settings;
pub mod tags;
pub mod users;

pub use contact_messages::ContactMessages;
pub use project_images::ProjectImages;
pub use projects::Projects;
pub use repository::Repository;
pub use site_settings::SiteSettings;
pub use tags::Tags;
pub use users::Users;
