//! Web UI assets with embedded fallbacks
//!
//! - If `UI_DIR` is NOT set: serve the embedded single-page app only
//! - If `UI_DIR` IS set: serve files from that directory, falling back to
//!   the embedded copy for anything missing

use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Embedded single-page app (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
#[include = "*.html"]
#[include = "*.css"]
#[include = "*.js"]
#[include = "*.svg"]
struct EmbeddedUi;

/// A static file ready to serve
#[derive(Debug, Clone)]
pub struct Asset {
    pub content: Cow<'static, [u8]>,
    pub mime_type: String,
}

/// UI asset loader with optional filesystem override
pub struct UiAssets {
    /// External UI directory (from UI_DIR env var)
    ui_dir: Option<PathBuf>,
}

impl UiAssets {
    pub fn new(ui_dir: Option<PathBuf>) -> Self {
        Self { ui_dir }
    }

    /// Look up an asset by its URL path ("" means index.html)
    pub fn get(&self, path: &str) -> Option<Asset> {
        let path = path.trim_start_matches('/');
        let path = if path.is_empty() { "index.html" } else { path };

        // Refuse anything that could leave the UI directory
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let mime_type = mime_guess::from_path(relative)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        if let Some(ref dir) = self.ui_dir {
            let full_path = dir.join(relative);
            if full_path.is_file() {
                tracing::trace!(path = %full_path.display(), "Loading UI asset from filesystem");
                match fs::read(&full_path) {
                    Ok(bytes) => {
                        return Some(Asset {
                            content: Cow::Owned(bytes),
                            mime_type,
                        })
                    }
                    Err(e) => {
                        tracing::warn!(path = %full_path.display(), %e, "Failed to read UI asset")
                    }
                }
            }
        }

        EmbeddedUi::get(path).map(|f| Asset {
            content: f.data,
            mime_type,
        })
    }

    /// Names of all embedded UI files
    pub fn list_embedded() -> Vec<String> {
        let mut files: Vec<String> = EmbeddedUi::iter().map(|f| f.to_string()).collect();
        files.sort();
        files
    }
}

impl Default for UiAssets {
    fn default() -> Self {
        Self::new(None)
    }
}
