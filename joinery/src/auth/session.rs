//! JWT session token creation and verification, and the session cookie.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::Error, types::UserId};

/// JWT session claims. Only identity is stored; the admin flag is always read from the database.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,   // Subject (user ID)
    pub email: String, // User email
    pub exp: i64,      // Expiration time
    pub iat: i64,      // Issued at
}

impl SessionClaims {
    pub fn new(user_id: UserId, email: &str, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.session.expiry;

        Self {
            sub: user_id,
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT sessions: secret_key is required".to_string(),
    })
}

/// Create a JWT token for a user session
pub fn create_session_token(user_id: UserId, email: &str, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user_id, email, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a JWT session token
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Anything else is a key or library failure on our side
        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    Ok(token_data.claims)
}

/// Value of the named cookie in a `Cookie` header
pub fn find_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value)
}

/// Format a `Set-Cookie` value with the configured attributes
pub fn cookie_header(name: &str, value: &str, max_age_secs: u64, config: &Config) -> String {
    let session_config = &config.auth.session;
    let secure = if session_config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{name}={value}; Path=/; HttpOnly; SameSite={}; Max-Age={max_age_secs}{secure}",
        session_config.cookie_same_site
    )
}

/// `Set-Cookie` value carrying a fresh session token
pub fn session_cookie(token: &str, config: &Config) -> String {
    cookie_header(&config.auth.session.cookie_name, token, config.auth.session.expiry.as_secs(), config)
}

/// `Set-Cookie` value removing the session
pub fn clear_session_cookie(config: &Config) -> String {
    cookie_header(&config.auth.session.cookie_name, "", 0, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        let mut config = Config {
            secret_key: Some("test-secret-key-for-jwt-at-least-32-bytes".to_string()),
            ..Default::default()
        };
        config.auth.session.expiry = Duration::from_secs(3600);
        config
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let user_id = Uuid::new_v4();

        let token = create_session_token(user_id, "owner@example.com", &config).unwrap();
        let claims = verify_session_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "owner@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_verify_rejects_other_key_and_garbage() {
        let config = create_test_config();
        let token = create_session_token(Uuid::new_v4(), "owner@example.com", &config).unwrap();

        let mut other = create_test_config();
        other.secret_key = Some("a-completely-different-secret-key-value".to_string());
        assert!(matches!(
            verify_session_token(&token, &other),
            Err(Error::Unauthenticated { .. })
        ));
        assert!(matches!(
            verify_session_token("not-a-jwt", &config),
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let config = create_test_config();
        let claims = SessionClaims {
            sub: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
            exp: Utc::now().timestamp() - 3600,
            iat: Utc::now().timestamp() - 7200,
        };
        let key = EncodingKey::from_secret(config.secret_key.as_deref().unwrap().as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        assert!(matches!(
            verify_session_token(&token, &config),
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_missing_secret_is_internal_error() {
        let config = Config::default();
        assert!(matches!(
            create_session_token(Uuid::new_v4(), "a@b.c", &config),
            Err(Error::Internal { .. })
        ));
    }

    #[test]
    fn test_find_cookie() {
        let header = "theme=dark; joinery_session=abc.def.ghi; other=1";
        assert_eq!(find_cookie(header, "joinery_session"), Some("abc.def.ghi"));
        assert_eq!(find_cookie(header, "missing"), None);
        assert_eq!(find_cookie("", "joinery_session"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = create_test_config();
        let cookie = session_cookie("tok", &config);
        assert_eq!(cookie, "joinery_session=tok; Path=/; HttpOnly; SameSite=lax; Max-Age=3600; Secure");

        config.auth.session.cookie_secure = false;
        let cleared = clear_session_cookie(&config);
        assert_eq!(cleared, "joinery_session=; Path=/; HttpOnly; SameSite=lax; Max-Age=0");
    }
}
