//! Authentication and authorization.
//!
//! Visitors sign in through an external OAuth 2.0 identity provider ([`oauth`]). On the
//! callback the user is upserted by email, and a signed JWT is set as an HttpOnly session
//! cookie ([`session`]). Handlers take [`CurrentUser`] or [`AdminUser`] extractors
//! ([`current_user`]); both reload the user from the database, so `is_admin` is never trusted
//! from the token.
//!
//! Admin status is only granted by `auth.admin_emails` at startup or directly in the database.
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser
//! [`AdminUser`]: crate::api::models::users::AdminUser

pub mod current_user;
pub mod oauth;
pub mod session;
