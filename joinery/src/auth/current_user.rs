use crate::{
    AppState,
    api::models::users::{AdminUser, CurrentUser},
    auth::session,
    db::handlers::Users,
    errors::{Error, Result},
    types::{Operation, Resource},
};
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Method, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Session claims from the request's session cookie.
/// Returns:
/// - None: no session cookie, or one that does not verify
/// - Some(claims): valid session
fn session_claims(parts: &Parts, state: &AppState) -> Option<session::SessionClaims> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    let token = session::find_cookie(cookie_header, &state.config.auth.session.cookie_name)?;

    match session::verify_session_token(token, &state.config) {
        Ok(claims) => Some(claims),
        Err(e) => {
            // Expired sessions are routine; treat them as signed out
            trace!("Session cookie rejected: {:?}", e);
            None
        }
    }
}

/// Load the signed-in user, if any. Session tokens only carry identity, so the user is read
/// from the database each time and a revoked admin loses access immediately.
#[instrument(skip_all)]
pub async fn optional_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    let Some(claims) = session_claims(parts, state) else {
        return Ok(None);
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(claims.sub).await?;

    if user.is_none() {
        debug!("Session for unknown user {}", claims.sub);
    }
    Ok(user.map(CurrentUser::from))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        optional_user(parts, state).await?.ok_or(Error::Unauthenticated { message: None })
    }
}

/// Operation a request performs, for permission errors
fn operation_of(method: &Method) -> Operation {
    match *method {
        Method::POST => Operation::Create,
        Method::PUT | Method::PATCH => Operation::Update,
        Method::DELETE => Operation::Delete,
        _ => Operation::Read,
    }
}

/// Admin resource a path addresses, for permission errors
fn resource_of(path: &str) -> Resource {
    let Some(rest) = path.strip_prefix("/api/admin/") else {
        return Resource::Dashboard;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    match segments.as_slice() {
        ["projects", _, "images", ..] => Resource::Images,
        ["projects", ..] => Resource::Projects,
        ["tags", ..] => Resource::Tags,
        ["settings", ..] => Resource::Settings,
        ["messages", ..] => Resource::Messages,
        ["uploads", ..] => Resource::Uploads,
        _ => Resource::Dashboard,
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            // Nested routers see a stripped path
            let path = match parts.extensions.get::<OriginalUri>() {
                Some(original) => original.path().to_string(),
                None => parts.uri.path().to_string(),
            };
            return Err(Error::InsufficientPermissions {
                action: operation_of(&parts.method),
                resource: resource_of(&path),
            });
        }
        Ok(AdminUser(user))
    }
}
