//! Media storage abstraction
//!
//! Photos and avatars live at an external media service. The API only needs
//! to upload bytes, delete an object, and derive transformed delivery URLs.

use crate::{PresetStep, Result};
use async_trait::async_trait;

/// A file to upload
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Sub-folder below the configured root, e.g. `photos/42`
    pub folder: String,
}

/// Where an uploaded object ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    pub public_id: String,
}

/// Trait for media storage backends
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store the bytes and return the delivery URL and public id
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia>;

    /// Remove a stored object
    async fn destroy(&self, public_id: &str) -> Result<()>;

    /// Delivery URL of `public_id` with the preset applied
    fn transformed_url(&self, public_id: &str, preset: &[PresetStep]) -> Result<String>;

    /// Backend name for logs
    fn name(&self) -> &str;
}
