//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the JSON API, sign-in routes and pages
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Public** (`/api/*`): published projects, tags with counts, site settings, the contact
//!   form and the current session
//! - **Admin** (`/api/admin/*`): projects and their images, direct-upload signing, tags,
//!   settings and received contact messages. Every admin handler takes an
//!   [`AdminUser`](models::users::AdminUser).
//! - **Sign-in** (`/auth/*`): OAuth redirect, callback and sign-out
//! - **Webhooks** (`/webhooks/email`): delivery events from the email provider
//!
//! # OpenAPI Documentation
//!
//! JSON endpoints are documented with `utoipa` annotations. The document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
