//! Cloudinary-compatible media client
//!
//! Uploads use signed requests: the signed parameters are sorted, joined as
//! `k=v&k=v`, suffixed with the API secret and hashed with SHA-256.

use async_trait::async_trait;
use photoshare_core::transform::build_transformation;
use photoshare_core::{
    MediaConfig, MediaStorage, MediaUpload, PhotoShareError, PresetStep, Result, StoredMedia,
};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cloudinary API client
pub struct CloudinaryClient {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    root_folder: String,
    api_base_url: String,
    delivery_base_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryClient {
    /// Create a new client with the public Cloudinary endpoints
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        let defaults = MediaConfig::default();
        Self {
            client: Client::new(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            root_folder: defaults.folder,
            api_base_url: defaults.api_base_url,
            delivery_base_url: defaults.delivery_base_url,
        }
    }

    /// Create from config
    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        let missing = |what: &str| PhotoShareError::ConfigError(format!("Cloudinary {what} required"));
        let cloud_name = config.cloud_name.clone().ok_or_else(|| missing("cloud name"))?;
        let api_key = config.api_key.clone().ok_or_else(|| missing("API key"))?;
        let api_secret = config.api_secret.clone().ok_or_else(|| missing("API secret"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PhotoShareError::MediaError(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            cloud_name,
            api_key,
            api_secret,
            root_folder: config.folder.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            delivery_base_url: config.delivery_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{action}", self.api_base_url, self.cloud_name)
    }

    fn folder_for(&self, sub_folder: &str) -> String {
        let sub_folder = sub_folder.trim_matches('/');
        if sub_folder.is_empty() {
            self.root_folder.clone()
        } else {
            format!("{}/{sub_folder}", self.root_folder)
        }
    }

    /// Sign the parameters that Cloudinary includes in its signature check
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        signature(params, &self.api_secret)
    }
}

fn signature(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let payload = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let digest = Sha256::digest(format!("{payload}{secret}").as_bytes());
    format!("{digest:x}")
}

#[async_trait]
impl MediaStorage for CloudinaryClient {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let folder = self.folder_for(&upload.folder);

        let mut signed = BTreeMap::new();
        signed.insert("folder", folder.clone());
        signed.insert("timestamp", timestamp.clone());
        let signature = self.sign(&signed);

        let mut file = Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type {
            file = file
                .mime_str(&content_type)
                .map_err(|e| PhotoShareError::ValidationError(format!("Invalid content type: {e}")))?;
        }

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("folder", folder)
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PhotoShareError::MediaError(format!("Upload request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PhotoShareError::MediaError(format!(
                "Cloudinary upload error: {error_text}"
            )));
        }

        let result: UploadResponse = response
            .json()
            .await
            .map_err(|e| PhotoShareError::MediaError(format!("Failed to parse response: {e}")))?;

        tracing::debug!(public_id = %result.public_id, "Uploaded media");

        Ok(StoredMedia {
            url: result.secure_url,
            public_id: result.public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut signed = BTreeMap::new();
        signed.insert("public_id", public_id.to_string());
        signed.insert("timestamp", timestamp.clone());
        let signature = self.sign(&signed);

        let params = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| PhotoShareError::MediaError(format!("Destroy request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PhotoShareError::MediaError(format!(
                "Cloudinary destroy error: {error_text}"
            )));
        }

        let result: DestroyResponse = response
            .json()
            .await
            .map_err(|e| PhotoShareError::MediaError(format!("Failed to parse response: {e}")))?;

        match result.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(PhotoShareError::MediaError(format!(
                "Cloudinary destroy returned {other}"
            ))),
        }
    }

    fn transformed_url(&self, public_id: &str, preset: &[PresetStep]) -> Result<String> {
        let transformation = build_transformation(preset)?;
        Ok(format!(
            "{}/{}/image/upload/{transformation}/{public_id}",
            self.delivery_base_url, self.cloud_name
        ))
    }

    fn name(&self) -> &str {
        "cloudinary"
    }
}
