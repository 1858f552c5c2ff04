//! PhotoShare Media - storage backends for photos and avatars
//!
//! - [`CloudinaryClient`]: signed uploads and transformation URLs against a
//!   Cloudinary-compatible API
//! - [`InMemoryMediaStore`]: keeps uploads in process memory, for tests and
//!   for development without cloud credentials

pub mod cloudinary;
pub mod memory;

pub use cloudinary::CloudinaryClient;
pub use memory::InMemoryMediaStore;

use photoshare_core::{MediaConfig, MediaStorage};
use std::sync::Arc;

/// Pick a backend from configuration
pub fn from_config(config: &MediaConfig) -> photoshare_core::Result<Arc<dyn MediaStorage>> {
    if config.is_configured() {
        Ok(Arc::new(CloudinaryClient::from_config(config)?))
    } else {
        tracing::warn!("Media service not configured, keeping uploads in memory");
        Ok(Arc::new(InMemoryMediaStore::new()))
    }
}
