use crate::{
    AppState,
    db::handlers::ContactMessages,
    errors::{Error, Result},
    webhooks::{EmailEvent, EmailEventType, signing},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tracing::{debug, info, warn};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

#[utoipa::path(
    post,
    path = "/webhooks/email",
    tag = "webhooks",
    summary = "Email delivery events",
    description = "Delivery, bounce and complaint events from the email provider, signed with the \
                   Standard Webhooks scheme. Events for unknown messages and unknown event types \
                   are accepted and ignored.",
    request_body(content = String, description = "Event JSON", content_type = "application/json"),
    params(
        ("webhook-id" = String, Header, description = "Unique message id"),
        ("webhook-timestamp" = String, Header, description = "Unix timestamp in seconds"),
        ("webhook-signature" = String, Header, description = "Space-separated `v1,{signature}` list"),
    ),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Signed payload is not a valid event"),
        (status = 401, description = "Missing, stale or invalid signature")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn email_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<StatusCode> {
    let Some(secret) = state.config.email.webhook_secret.as_deref() else {
        warn!("Email webhook called but no webhook secret is configured");
        return Err(Error::Unauthenticated {
            message: Some("Webhooks are not configured".to_string()),
        });
    };

    signing::verify(
        header(&headers, "webhook-id"),
        header(&headers, "webhook-timestamp"),
        header(&headers, "webhook-signature"),
        &body,
        secret,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        info!("Rejected email webhook: {}", e);
        Error::Unauthenticated {
            message: Some("Invalid webhook signature".to_string()),
        }
    })?;

    let event: EmailEvent = serde_json::from_slice(&body).map_err(|e| Error::BadRequest {
        message: format!("Invalid event payload: {e}"),
    })?;

    let Some(event_type) = EmailEventType::parse(&event.event_type) else {
        debug!("Ignoring email event {}", event.event_type);
        return Ok(StatusCode::OK);
    };

    let reason = match event_type {
        EmailEventType::Delivered => None,
        EmailEventType::Bounced | EmailEventType::Complained => {
            Some(event.data.reason.clone().unwrap_or_else(|| event.event_type.clone()))
        }
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = ContactMessages::new(&mut conn)
        .update_status_by_provider_id(&event.data.message_id, event_type.status(), reason.as_deref())
        .await?;

    if updated == 0 {
        debug!("No contact message for {}", event.data.message_id);
    } else {
        info!("Contact message {} is now {}", event.data.message_id, event_type.status());
    }
    Ok(StatusCode::OK)
}
