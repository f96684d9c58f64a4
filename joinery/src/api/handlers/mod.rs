//! HTTP request handlers.
//!
//! Each handler validates its input, checks the caller through the auth extractors, runs the
//! business logic over the repositories in [`crate::db::handlers`] and the media host, and
//! serializes the response.
//!
//! # Handler Modules
//!
//! - [`auth`]: OAuth sign-in, callback, sign-out and the session endpoint
//! - [`contact`]: contact form submission and the admin message list
//! - [`email_webhooks`]: signed delivery events from the email provider
//! - [`images`]: image registration, server-side upload, ordering and cover selection
//! - [`pages`]: server-rendered public pages and the admin shell
//! - [`projects`]: project CRUD, folder allocation, date moves and per-day ordering
//! - [`settings`]: site settings
//! - [`static_assets`]: embedded CSS and images
//! - [`tags`]: tag CRUD and public tag counts
//! - [`uploads`]: signed direct-upload credentials

pub mod auth;
pub mod contact;
pub mod email_webhooks;
pub mod images;
pub mod pages;
pub mod projects;
pub mod settings;
pub mod static_assets;
pub mod tags;
pub mod uploads;
