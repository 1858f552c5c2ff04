//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod auth;
pub mod comments;
pub mod filters;
pub mod health;
pub mod photos;
pub mod ratings;
pub mod tags;
pub mod transformations;
pub mod users;

use crate::error::AppError;
use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Plain message response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Largest page a listing may request
pub const MAX_PAGE_SIZE: i64 = 50;

/// Check `limit`/`offset` query values, applying the default page size
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> Result<(i64, i64), AppError> {
    let limit = limit.unwrap_or(10);
    let offset = offset.unwrap_or(0);

    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Unprocessable(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    if offset < 0 {
        return Err(AppError::Unprocessable(
            "offset must not be negative".to_string(),
        ));
    }

    Ok((limit, offset))
}

/// A file part of a multipart form
#[derive(Debug)]
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A multipart form: the `file` part plus every text field
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|err| {
            tracing::debug!(error = %err, "Failed to read multipart field");
            AppError::BadRequest("Invalid multipart data".to_string())
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    tracing::debug!(error = %err, file_name = %file_name, "Failed to read file data");
                    AppError::BadRequest("Failed to read file data".to_string())
                })?;

                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest(format!("Invalid value for {name}")))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// The file part; 422 when missing or empty
    pub fn require_file(&mut self) -> Result<UploadedFile, AppError> {
        self.file
            .take()
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| AppError::Unprocessable("file is required".to_string()))
    }

    /// A text field with surrounding whitespace removed; blank counts as absent
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
