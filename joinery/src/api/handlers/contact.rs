//! Contact form handlers.
//!
//! Every real submission is stored before any mail goes out, so a message survives a failed
//! send and shows up in the admin list with its error. Delivery events later move it on to
//! `delivered` or `bounced` (see [`super::email_webhooks`]).

use crate::{
    AppState,
    api::{
        handlers::settings::load_settings,
        models::{
            contact::{ContactMessageResponse, ContactRequest, ContactResponse},
            pagination::{PaginatedResponse, Pagination},
            users::AdminUser,
        },
    },
    db::{handlers::ContactMessages, models::contact_messages::ContactMessageCreateDBRequest},
    email::{ContactEmail, EmailService},
    errors::{Error, Result},
    types::abbrev_uuid,
};
use axum::{
    Json,
    extract::{Query, State},
};
use tracing::{debug, error, info};

const THANKS: &str = "Thanks for getting in touch. We'll reply as soon as we can.";

#[utoipa::path(
    post,
    path = "/api/contact",
    tag = "contact",
    summary = "Send a message",
    description = "Stores the message and forwards it by email to the business, with Reply-To set \
                   to the sender.",
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Message sent", body = ContactResponse),
        (status = 400, description = "Invalid name, email, phone or message"),
        (status = 500, description = "The message was stored but could not be sent")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn submit_contact(State(state): State<AppState>, Json(request): Json<ContactRequest>) -> Result<Json<ContactResponse>> {
    if request.is_spam() {
        debug!("Dropping contact submission with the honeypot filled in");
        return Ok(Json(ContactResponse { message: THANKS.to_string() }));
    }
    let contact = request.validate().map_err(|message| Error::BadRequest { message })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let stored = ContactMessages::new(&mut conn)
        .create(&ContactMessageCreateDBRequest {
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            message: contact.message.clone(),
        })
        .await?;

    let settings = load_settings(&mut conn).await?;
    let recipient = settings
        .non_empty("contact_email")
        .map(str::to_string)
        .or_else(|| state.config.email.contact_recipient.clone());
    let Some(recipient) = recipient else {
        error!("No contact_email setting and no email.contact_recipient configured");
        ContactMessages::new(&mut conn)
            .mark_failed(stored.id, "no recipient configured")
            .await?;
        return Err(Error::Internal {
            operation: "find a recipient for the contact form".to_string(),
        });
    };

    let email = ContactEmail {
        name: &contact.name,
        email: &contact.email,
        phone: contact.phone.as_deref(),
        message: &contact.message,
    };
    let sent = match EmailService::new(&state.config) {
        Ok(service) => service.send_contact_message(&recipient, &email).await,
        Err(e) => Err(e),
    };

    match sent {
        Ok(provider_message_id) => {
            ContactMessages::new(&mut conn).mark_sent(stored.id, &provider_message_id).await?;
            info!("Contact message {} sent as {}", abbrev_uuid(&stored.id), provider_message_id);
            Ok(Json(ContactResponse { message: THANKS.to_string() }))
        }
        Err(e) => {
            error!("Failed to send contact message {}: {}", abbrev_uuid(&stored.id), e);
            ContactMessages::new(&mut conn).mark_failed(stored.id, &e.to_string()).await?;
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/messages",
    tag = "admin-messages",
    summary = "List contact messages",
    description = "Newest first, with delivery status.",
    params(Pagination),
    responses(
        (status = 200, description = "Page of messages", body = PaginatedResponse<ContactMessageResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: AdminUser,
) -> Result<Json<PaginatedResponse<ContactMessageResponse>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ContactMessages::new(&mut conn);

    let messages = repo.list(skip, limit).await?;
    let total_count = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        messages.into_iter().map(ContactMessageResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
