//! API request and response models.
//!
//! Database rows live in [`crate::db::models`]; these are the shapes the HTTP API accepts and
//! returns, with `From` conversions from the database types.

pub mod contact;
pub mod images;
pub mod pagination;
pub mod projects;
pub mod settings;
pub mod tags;
pub mod uploads;
pub mod users;
