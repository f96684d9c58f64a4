use crate::{
    AppState,
    api::models::users::{CurrentUser, SessionResponse},
    auth::{
        oauth::{self, STATE_COOKIE},
        session::{self, clear_session_cookie, cookie_header, create_session_token, find_cookie},
    },
    db::handlers::Users,
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Query, State},
    http::{
        HeaderMap, StatusCode,
        header::{COOKIE, LOCATION, SET_COOKIE},
    },
    response::{AppendHeaders, IntoResponse},
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SigninQuery {
    /// Relative path to return to after signing in (default `/admin`)
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined or the request was invalid
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/signin",
    tag = "authentication",
    summary = "Start signing in",
    description = "Redirects to the identity provider. The sign-in state is kept in a short-lived cookie.",
    params(SigninQuery),
    responses((status = 302, description = "Redirect to the identity provider"))
)]
#[tracing::instrument(skip_all)]
pub async fn signin(State(state): State<AppState>, Query(query): Query<SigninQuery>) -> impl IntoResponse {
    let config = &state.config;
    let oauth_state = oauth::generate_state();
    let callback = oauth::safe_callback_path(query.callback_url.as_deref());

    let state_cookie = cookie_header(
        STATE_COOKIE,
        &oauth::encode_state_cookie(&oauth_state, &callback),
        config.auth.oauth.state_ttl.as_secs(),
        config,
    );
    let location = oauth::authorize_url(config, &oauth_state).to_string();

    (StatusCode::FOUND, AppendHeaders([(LOCATION, location), (SET_COOKIE, state_cookie)]))
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = "authentication",
    summary = "Finish signing in",
    description = "Called by the identity provider. Checks the state, exchanges the code, creates or \
                   refreshes the user, sets the session cookie and redirects to the page sign-in started from.",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Signed in; redirect to the callback path"),
        (status = 400, description = "Missing code, or state does not match"),
        (status = 401, description = "The identity provider refused the sign-in")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse> {
    if let Some(error) = query.error {
        info!("Identity provider returned error: {}", error);
        return Err(Error::BadRequest {
            message: format!("Sign-in was not completed: {error}"),
        });
    }
    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        return Err(Error::BadRequest {
            message: "Missing code or state".to_string(),
        });
    };

    let stored = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| find_cookie(cookies, STATE_COOKIE))
        .and_then(oauth::decode_state_cookie);
    let Some((expected_state, callback_path)) = stored else {
        return Err(Error::BadRequest {
            message: "Sign-in expired, please try again".to_string(),
        });
    };
    if expected_state != returned_state {
        warn!("OAuth state mismatch on callback");
        return Err(Error::BadRequest {
            message: "Sign-in state does not match, please try again".to_string(),
        });
    }

    let config = &state.config;
    let access_token = state.oauth.exchange_code(&code, &oauth::redirect_uri(config)).await?;
    let profile = state.oauth.fetch_profile(&access_token).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).upsert_from_oauth(&profile).await?;
    info!("{} signed in (admin: {})", user.email, user.is_admin);

    let token = create_session_token(user.id, &user.email, config)?;
    Ok((
        StatusCode::FOUND,
        AppendHeaders([
            (LOCATION, oauth::safe_callback_path(Some(&callback_path))),
            (SET_COOKIE, session::session_cookie(&token, config)),
            (SET_COOKIE, cookie_header(STATE_COOKIE, "", 0, config)),
        ]),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/signout",
    tag = "authentication",
    summary = "Sign out",
    responses((status = 204, description = "Session cookie cleared"))
)]
#[tracing::instrument(skip_all)]
pub async fn signout(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, AppendHeaders([(SET_COOKIE, clear_session_cookie(&state.config))]))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "authentication",
    summary = "Current session",
    responses(
        (status = 200, description = "The signed-in user", body = SessionResponse),
        (status = 401, description = "Not signed in")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_session(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use axum_test::TestResponse;
    use sqlx::PgPool;
    use std::collections::HashMap;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn set_cookies(response: &TestResponse) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    /// `name=value` part of the Set-Cookie for `name`
    fn cookie_pair(response: &TestResponse, name: &str) -> String {
        set_cookies(response)
            .into_iter()
            .find(|c| c.starts_with(&format!("{name}=")))
            .and_then(|c| c.split(';').next().map(str::to_string))
            .expect("cookie set")
    }

    async fn mock_provider(email: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "at-1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "provider-42",
                "email": email,
                "name": "Workshop Owner"
            })))
            .mount(&server)
            .await;
        server
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_signin_redirects_with_state_cookie(pool: PgPool) {
        let (server, _media) = create_test_app(pool).await;

        let response = server
            .get("/auth/signin")
            .add_query_param("callback_url", "/admin/tags")
            .await;
        response.assert_status(StatusCode::FOUND);

        let location = Url::parse(response.header(LOCATION).to_str().unwrap()).unwrap();
        let pairs: HashMap<_, _> = location.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "test-client");

        let state_cookie = cookie_pair(&response, STATE_COOKIE);
        let value = state_cookie.split_once('=').unwrap().1;
        let (state, callback) = oauth::decode_state_cookie(value).unwrap();
        assert_eq!(state, pairs["state"]);
        assert_eq!(callback, "/admin/tags");

        let response = server
            .get("/auth/signin")
            .add_query_param("callback_url", "/\t/evil.example")
            .await;
        let state_cookie = cookie_pair(&response, STATE_COOKIE);
        let (_, callback) = oauth::decode_state_cookie(state_cookie.split_once('=').unwrap().1).unwrap();
        assert_eq!(callback, "/admin");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_full_sign_in(pool: PgPool) {
        let provider = mock_provider("owner@joinery.test").await;
        let mut config = create_test_config();
        config.auth.oauth.token_url = Url::parse(&format!("{}/token", provider.uri())).unwrap();
        config.auth.oauth.userinfo_url = Url::parse(&format!("{}/userinfo", provider.uri())).unwrap();
        let (server, _media) = create_test_app_with_config(pool.clone(), config).await;

        let state_cookie = format!("{STATE_COOKIE}={}", oauth::encode_state_cookie("s-1", "/admin/projects"));
        let response = server
            .get("/auth/callback")
            .add_query_param("code", "the-code")
            .add_query_param("state", "s-1")
            .add_header("cookie", &state_cookie)
            .await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.header(LOCATION), "/admin/projects");
        assert!(set_cookies(&response).iter().any(|c| c.starts_with(&format!("{STATE_COOKIE}=;")) && c.contains("Max-Age=0")));

        let session = cookie_pair(&response, "joinery_session");
        let body: SessionResponse = server.get("/api/auth/session").add_header("cookie", &session).await.json();
        assert_eq!(body.user.email, "owner@joinery.test");
        assert_eq!(body.user.name.as_deref(), Some("Workshop Owner"));
        assert!(!body.user.is_admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_callback_rejects_bad_state(pool: PgPool) {
        let (server, _media) = create_test_app(pool).await;

        // No state cookie
        server
            .get("/auth/callback")
            .add_query_param("code", "c")
            .add_query_param("state", "s-1")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Different state
        server
            .get("/auth/callback")
            .add_query_param("code", "c")
            .add_query_param("state", "s-2")
            .add_header("cookie", format!("{STATE_COOKIE}={}", oauth::encode_state_cookie("s-1", "/admin")))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Provider error
        server
            .get("/auth/callback")
            .add_query_param("error", "access_denied")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_session_and_signout(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "visitor@joinery.test", false).await;
        let cookie = session_cookie_for(&create_test_config(), &user);

        server.get("/api/auth/session").await.assert_status(StatusCode::UNAUTHORIZED);
        let body: SessionResponse = server.get("/api/auth/session").add_header("cookie", &cookie).await.json();
        assert_eq!(body.user.id, user.id);

        let response = server.post("/auth/signout").await;
        response.assert_status(StatusCode::NO_CONTENT);
        assert!(set_cookies(&response)[0].starts_with("joinery_session=;"));
        assert!(set_cookies(&response)[0].contains("Max-Age=0"));
    }
}
