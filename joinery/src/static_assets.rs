//! Embedded static assets (stylesheet, scripts, favicon) for the public pages.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;
