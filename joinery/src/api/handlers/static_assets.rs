//! HTTP handler for embedded static assets.

use axum::{
    extract::Path,
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::static_assets;

/// Assets are not fingerprinted, so they may only be cached briefly
const CACHE_CONTROL_VALUE: &str = "public, max-age=3600";

/// Serve a file from the embedded `static/` folder
#[instrument]
pub async fn serve_static_asset(Path(path): Path<String>) -> Response {
    let Some(content) = static_assets::Assets::get(&path) else {
        debug!("No embedded asset at {}", path);
        return StatusCode::NOT_FOUND.into_response();
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    (
        [(CONTENT_TYPE, mime.as_ref().to_string()), (CACHE_CONTROL, CACHE_CONTROL_VALUE.to_string())],
        content.data.into_owned(),
    )
        .into_response()
}
