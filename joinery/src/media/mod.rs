//! Image hosting on Cloudinary.
//!
//! Project images never pass through our storage: browsers upload straight to the media host
//! with [`signing::signed_upload`] credentials, or the server forwards a multipart upload. The
//! database only keeps the resulting public id and delivery URL. Everything that changes assets
//! on the media host goes through the [`MediaStore`] trait so handlers can be tested against an
//! in-memory store.
//!
//! - [`signing`]: parameter signing and direct-upload credentials
//! - [`cloudinary`]: the HTTP client used in production

pub mod cloudinary;
pub mod signing;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use cloudinary::CloudinaryClient;
pub use signing::{SignatureAlgorithm, SignedUpload, sign_params, signed_upload};

/// An asset as stored on the media host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub public_id: String,
    /// HTTPS delivery URL
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// A file to upload into a folder
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub folder: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Operations on the media host.
///
/// `destroy` of an asset that does not exist succeeds, so callers can retry cleanup freely.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file: UploadFile) -> anyhow::Result<StoredAsset>;

    async fn destroy(&self, public_id: &str) -> anyhow::Result<()>;

    /// Move an asset to a new public id, returning it at its new location
    async fn rename(&self, from: &str, to: &str) -> anyhow::Result<StoredAsset>;

    /// Remove an (empty) folder
    async fn delete_folder(&self, folder: &str) -> anyhow::Result<()>;
}

/// Public id of an asset once its folder moves from `old_folder` to `new_folder`.
///
/// Returns `None` when the asset does not live under `old_folder`.
pub fn reparent_public_id(public_id: &str, old_folder: &str, new_folder: &str) -> Option<String> {
    let name = public_id.strip_prefix(old_folder)?.strip_prefix('/')?;
    if name.is_empty() {
        return None;
    }
    Some(format!("{new_folder}/{name}"))
}

/// True when `public_id` names an asset inside `folder`
pub fn is_in_folder(public_id: &str, folder: &str) -> bool {
    public_id
        .strip_prefix(folder)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty())
}
