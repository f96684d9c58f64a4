//! OpenAPI documentation for the JSON API, served at `/api-docs/openapi.json` with a Scalar UI
//! at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Session cookie set by `/auth/callback`
struct CookieSecurityAddon;

impl Modify for CookieSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "joinery_session",
                    "Session cookie set after signing in at `/auth/signin`. Admin endpoints also \
                     require the signed-in user to be an administrator.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "joinery",
        description = "Public and admin API of the joinery portfolio site."
    ),
    modifiers(&CookieSecurityAddon),
    paths(
        api::handlers::projects::list_published_projects,
        api::handlers::projects::get_published_project,
        api::handlers::tags::list_tags_with_counts,
        api::handlers::settings::get_settings,
        api::handlers::contact::submit_contact,
        api::handlers::auth::get_session,
        api::handlers::auth::signin,
        api::handlers::auth::callback,
        api::handlers::auth::signout,
        api::handlers::projects::list_projects,
        api::handlers::projects::create_project,
        api::handlers::projects::get_project,
        api::handlers::projects::update_project,
        api::handlers::projects::delete_project,
        api::handlers::projects::reorder_projects,
        api::handlers::images::register_image,
        api::handlers::images::upload_image,
        api::handlers::images::update_image,
        api::handlers::images::reorder_images,
        api::handlers::images::delete_image,
        api::handlers::uploads::sign_upload,
        api::handlers::tags::list_tags,
        api::handlers::tags::create_tag,
        api::handlers::tags::update_tag,
        api::handlers::tags::delete_tag,
        api::handlers::settings::get_admin_settings,
        api::handlers::settings::update_settings,
        api::handlers::contact::list_messages,
        api::handlers::email_webhooks::email_event,
    ),
    components(
        schemas(
            api::models::projects::ProjectCreate,
            api::models::projects::ProjectUpdate,
            api::models::projects::ProjectOrderUpdate,
            api::models::projects::ProjectResponse,
            api::models::images::ImageRegister,
            api::models::images::ImageUpdate,
            api::models::images::ImageOrderUpdate,
            api::models::images::ImageResponse,
            api::models::tags::TagCreate,
            api::models::tags::TagUpdate,
            api::models::tags::TagResponse,
            api::models::tags::TagWithCountResponse,
            api::models::settings::SiteSettings,
            api::models::contact::ContactRequest,
            api::models::contact::ContactResponse,
            api::models::contact::ContactMessageResponse,
            api::models::uploads::SignUploadRequest,
            api::models::users::CurrentUser,
            api::models::users::SessionResponse,
            crate::db::models::contact_messages::MessageStatus,
            crate::media::SignedUpload,
        )
    ),
    tags(
        (name = "projects", description = "Published projects and their tags."),
        (name = "settings", description = "Site-wide text and contact details."),
        (name = "contact", description = "The public contact form."),
        (name = "authentication", description = "Signing in through the identity provider."),
        (name = "admin-projects", description = "Create, edit, move and order projects. Each project's images live in a \
folder on the media host derived from its date; changing the date moves them."),
        (name = "admin-images", description = "Upload, describe, order and delete project images."),
        (name = "admin-tags", description = "Manage tags."),
        (name = "admin-settings", description = "Edit site settings."),
        (name = "admin-messages", description = "Contact-form messages and their delivery status."),
        (name = "webhooks", description = "Callbacks from the email provider."),
    )
)]
pub struct ApiDoc;
