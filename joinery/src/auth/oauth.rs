//! OAuth 2.0 authorization-code flow against the configured identity provider.
//!
//! Sign-in keeps no server-side state: a random `state` value and the page to return to are
//! stored in a short-lived HttpOnly cookie, and the callback must present the same `state`.

use anyhow::Context;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::prelude::RngExt;
use rand::rng;
use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{Config, OAuthConfig};
use crate::db::models::users::OAuthProfile;
use crate::errors::Error;

/// Cookie holding the in-flight sign-in state
pub const STATE_COOKIE: &str = "joinery_oauth_state";

/// Where sign-in lands when no (acceptable) callback was given
pub const DEFAULT_CALLBACK: &str = "/admin";

/// Path of the callback route, relative to `public_url`
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Random value tying a callback to the browser that started the sign-in
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Only same-site relative paths are honoured as post-sign-in destinations.
///
/// Browsers drop tabs and newlines from URLs and read `\` as `/`, so a path holding either
/// could resolve to another host.
pub fn safe_callback_path(callback: Option<&str>) -> String {
    match callback {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.chars().any(|c| c == '\\' || c.is_control() || c.is_whitespace()) =>
        {
            path.to_string()
        }
        _ => DEFAULT_CALLBACK.to_string(),
    }
}

/// Cookie value for a sign-in attempt: `{state}.{base64 callback}`
pub fn encode_state_cookie(state: &str, callback: &str) -> String {
    format!("{state}.{}", URL_SAFE_NO_PAD.encode(callback))
}

/// Split a state cookie into `(state, callback)`
pub fn decode_state_cookie(value: &str) -> Option<(String, String)> {
    let (state, callback) = value.split_once('.')?;
    if state.is_empty() {
        return None;
    }
    let callback = URL_SAFE_NO_PAD.decode(callback).ok()?;
    let callback = String::from_utf8(callback).ok()?;
    Some((state.to_string(), safe_callback_path(Some(&callback))))
}

/// Redirect URI registered with the provider
pub fn redirect_uri(config: &Config) -> String {
    config.public_link(CALLBACK_PATH)
}

/// Provider URL the browser is sent to
pub fn authorize_url(config: &Config, state: &str) -> Url {
    let oauth = &config.auth.oauth;
    let mut url = oauth.authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &oauth.client_id)
        .append_pair("redirect_uri", &redirect_uri(config))
        .append_pair("scope", &oauth.scopes.join(" "))
        .append_pair("state", state);
    url
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Subset of the OpenID Connect userinfo claims we use
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

/// Token and userinfo calls to the identity provider
#[derive(Clone)]
pub struct OAuthClient {
    client: Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> anyhow::Result<Self> {
        crate::install_crypto_provider();
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create OAuth HTTP client")?;
        Ok(Self { client, config })
    }

    /// Exchange an authorization code for an access token
    #[instrument(skip_all, err)]
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, Error> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let body = serde_urlencoded::to_string(form).map_err(|e| Error::Internal {
            operation: format!("encode token request: {e}"),
        })?;

        let response = self
            .client
            .post(self.config.token_url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("call token endpoint: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!("Token endpoint answered {}: {}", status, text);
            // Usually an expired or replayed code
            return Err(Error::Unauthenticated {
                message: Some("Sign-in was rejected by the identity provider".to_string()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| Error::Internal {
            operation: format!("decode token response: {e}"),
        })?;
        Ok(token.access_token)
    }

    /// Fetch the user's profile. An email is required; one the provider marks unverified is refused.
    #[instrument(skip_all, err)]
    pub async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, Error> {
        let response = self
            .client
            .get(self.config.userinfo_url.as_str())
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("call userinfo endpoint: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(Error::Internal {
                operation: format!("fetch user profile: userinfo answered {}", response.status()),
            });
        }

        let info: UserInfo = response.json().await.map_err(|e| Error::Internal {
            operation: format!("decode userinfo response: {e}"),
        })?;

        let email = match (info.email, info.email_verified) {
            (Some(email), None | Some(true)) if !email.trim().is_empty() => email,
            _ => {
                return Err(Error::Unauthenticated {
                    message: Some("The identity provider did not share a verified email address".to_string()),
                });
            }
        };

        Ok(OAuthProfile {
            provider: self.config.provider.clone(),
            provider_account_id: info.sub,
            email,
            name: info.name,
            image: info.picture,
        })
    }
}
