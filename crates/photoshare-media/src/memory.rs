//! In-memory media store

use async_trait::async_trait;
use photoshare_core::transform::build_transformation;
use photoshare_core::{MediaStorage, MediaUpload, PresetStep, Result, StoredMedia};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps uploaded bytes in a map keyed by public id
#[derive(Debug, Default)]
pub struct InMemoryMediaStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an object with this public id is stored
    pub async fn contains(&self, public_id: &str) -> bool {
        self.objects.read().await.contains_key(public_id)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStorage for InMemoryMediaStore {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia> {
        let folder = upload.folder.trim_matches('/');
        let public_id = if folder.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{folder}/{}", Uuid::new_v4())
        };

        self.objects
            .write()
            .await
            .insert(public_id.clone(), upload.bytes);

        Ok(StoredMedia {
            url: format!("memory://{public_id}"),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<()> {
        self.objects.write().await.remove(public_id);
        Ok(())
    }

    fn transformed_url(&self, public_id: &str, preset: &[PresetStep]) -> Result<String> {
        let transformation = build_transformation(preset)?;
        Ok(format!("memory://{transformation}/{public_id}"))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
