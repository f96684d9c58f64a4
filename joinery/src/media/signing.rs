//! Cloudinary request signing.
//!
//! Signed calls carry a `signature` computed over the other parameters:
//! - parameters with empty values are dropped, as are `file`, `cloud_name`, `resource_type`,
//!   `api_key` and `signature` itself
//! - the rest are sorted by key and joined as `key=value&key=value`
//! - the API secret is appended and the result hashed, hex-encoded
//!
//! SHA-1 is the account default; accounts can opt into SHA-256.
//!
//! See: <https://cloudinary.com/documentation/authentication_signatures>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::config::CloudinaryConfig;

/// Parameters that are sent but never signed
const UNSIGNED_PARAMS: &[&str] = &["file", "cloud_name", "resource_type", "api_key", "signature"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

/// String the signature is computed over, before the secret is appended
pub fn string_to_sign<K, V>(params: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(k, v)| !v.as_ref().is_empty() && !UNSIGNED_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
}

/// Sign a set of request parameters
pub fn sign_params<K, V>(params: impl IntoIterator<Item = (K, V)>, secret: &str, algorithm: SignatureAlgorithm) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let payload = format!("{}{}", string_to_sign(params), secret);
    match algorithm {
        SignatureAlgorithm::Sha1 => format!("{:x}", Sha1::digest(payload.as_bytes())),
        SignatureAlgorithm::Sha256 => format!("{:x}", Sha256::digest(payload.as_bytes())),
    }
}

/// Credentials for one direct browser upload into a folder.
///
/// The media host rejects the signature once `timestamp` is more than an hour old.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignedUpload {
    pub cloud_name: String,
    pub api_key: String,
    pub timestamp: i64,
    pub folder: String,
    pub signature: String,
    /// Endpoint the browser posts the multipart form to
    pub upload_url: String,
}

/// Issue signed upload parameters for `folder`
pub fn signed_upload(config: &CloudinaryConfig, folder: &str, now: DateTime<Utc>) -> SignedUpload {
    let timestamp = now.timestamp();
    let signature = sign_params(
        [("folder", folder.to_string()), ("timestamp", timestamp.to_string())],
        &config.api_secret,
        config.signature_algorithm,
    );

    SignedUpload {
        cloud_name: config.cloud_name.clone(),
        api_key: config.api_key.clone(),
        timestamp,
        folder: folder.to_string(),
        signature,
        upload_url: config.endpoint("image/upload"),
    }
}
