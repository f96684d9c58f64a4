use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::Utc;
use reqwest::{Client, Response, header::CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{MediaStore, StoredAsset, UploadFile, signing::sign_params};
use crate::config::CloudinaryConfig;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `MediaStore` backed by the Cloudinary Upload and Admin APIs
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
}

/// Resource body returned by upload and rename
#[derive(Debug, Deserialize)]
struct ResourceResponse {
    public_id: String,
    secure_url: String,
    width: Option<i32>,
    height: Option<i32>,
}

impl From<ResourceResponse> for StoredAsset {
    fn from(resource: ResourceResponse) -> Self {
        Self {
            public_id: resource.public_id,
            url: resource.secure_url,
            width: resource.width,
            height: resource.height,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> anyhow::Result<Self> {
        crate::install_crypto_provider();
        let client = Client::builder()
            .timeout(config.upload_timeout)
            .build()
            .context("Failed to create Cloudinary HTTP client")?;
        Ok(Self { client, config })
    }

    /// Add `timestamp`, `api_key` and `signature` to a set of call parameters
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("timestamp", Utc::now().timestamp().to_string()));
        let signature = sign_params(params.iter().map(|(k, v)| (*k, v.as_str())), &self.config.api_secret, self.config.signature_algorithm);
        params.push(("api_key", self.config.api_key.clone()));
        params.push(("signature", signature));
        params
    }

    async fn post_signed(&self, action: &str, params: Vec<(&'static str, String)>) -> anyhow::Result<Response> {
        let url = self.config.endpoint(action);
        let body = serde_urlencoded::to_string(self.signed_form(params)).context("Failed to encode Cloudinary form")?;

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Cloudinary request to {action} failed"))?;

        Ok(response)
    }
}

/// Decode a successful JSON body, or turn an error body into an `anyhow` error
async fn decode<T: DeserializeOwned>(action: &str, response: Response) -> anyhow::Result<T> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(anyhow!("Cloudinary {action} failed: {status} - {message}"));
    }

    serde_json::from_str(&body).map_err(|e| anyhow!("error decoding Cloudinary {action} response: {e}"))
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    #[instrument(skip(self, file), fields(folder = %file.folder, size = file.bytes.len()), err)]
    async fn upload(&self, file: UploadFile) -> anyhow::Result<StoredAsset> {
        let data_uri = format!("data:{};base64,{}", file.content_type, BASE64_STANDARD.encode(&file.bytes));

        let mut params = vec![("folder", file.folder), ("use_filename", "true".to_string()), ("unique_filename", "true".to_string())];
        if !file.file_name.is_empty() {
            params.push(("filename_override", file.file_name));
        }
        params.push(("file", data_uri));

        let response = self.post_signed("image/upload", params).await?;
        let resource: ResourceResponse = decode("upload", response).await?;
        Ok(resource.into())
    }

    #[instrument(skip(self), err)]
    async fn destroy(&self, public_id: &str) -> anyhow::Result<()> {
        let params = vec![("public_id", public_id.to_string()), ("invalidate", "true".to_string())];
        let response = self.post_signed("image/destroy", params).await?;
        let result: DestroyResponse = decode("destroy", response).await?;

        match result.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                debug!("Asset {} was already gone", public_id);
                Ok(())
            }
            other => Err(anyhow!("Cloudinary destroy of {public_id} returned '{other}'")),
        }
    }

    #[instrument(skip(self), err)]
    async fn rename(&self, from: &str, to: &str) -> anyhow::Result<StoredAsset> {
        let params = vec![
            ("from_public_id", from.to_string()),
            ("to_public_id", to.to_string()),
            ("invalidate", "true".to_string()),
        ];
        let response = self.post_signed("image/rename", params).await?;
        let resource: ResourceResponse = decode("rename", response).await?;
        Ok(resource.into())
    }

    #[instrument(skip(self), err)]
    async fn delete_folder(&self, folder: &str) -> anyhow::Result<()> {
        // Admin API: basic auth instead of a signature
        let url = self.config.endpoint(&format!("folders/{}", folder.trim_matches('/')));
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await
            .context("Cloudinary folder delete request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("Folder {} not found on media host", folder);
            return Ok(());
        }

        let _: serde_json::Value = decode("delete folder", response).await?;
        Ok(())
    }
}
