//! Multipart file uploads kept on local disk and served under `/uploads`.

use actix_multipart::Multipart;
use futures_util::TryStreamExt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::errors::AppError;

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/pdf",
];

pub const PUBLIC_PREFIX: &str = "/uploads";

pub fn is_mime_type_allowed(content_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&content_type)
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// A file read from a multipart body, already checked for size and type.
#[derive(Debug)]
pub struct UploadedFile {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Where uploads land and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Pull the `file` field out of a multipart body. Other fields are ignored.
    pub async fn read_file(&self, mut payload: Multipart) -> Result<UploadedFile, AppError> {
        let mut uploaded: Option<UploadedFile> = None;

        while let Some(mut field) = payload
            .try_next()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read multipart data: {e}")))?
        {
            let name = field
                .content_disposition()
                .and_then(|cd| cd.get_name())
                .unwrap_or("")
                .to_string();

            if name != "file" {
                tracing::debug!("Ignoring multipart field: {name}");
                continue;
            }

            let content_type = field
                .content_type()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());

            if !is_mime_type_allowed(&content_type) {
                return Err(AppError::BadRequest(format!(
                    "File type '{}' is not allowed. Allowed types: {}",
                    content_type,
                    ALLOWED_MIME_TYPES.join(", ")
                )));
            }

            let mut data = Vec::new();
            while let Some(chunk) = field
                .try_next()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {e}")))?
            {
                if data.len() + chunk.len() > self.max_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File too large. Maximum size is {} bytes",
                        self.max_bytes
                    )));
                }
                data.extend_from_slice(&chunk);
            }

            uploaded = Some(UploadedFile { content_type, data });
        }

        let file = uploaded.ok_or_else(|| AppError::validation("file", "File is required"))?;
        if file.data.is_empty() {
            return Err(AppError::validation("file", "File is empty"));
        }
        Ok(file)
    }

    /// Write the file under `<dir>/<folder>/` and return its public URL.
    pub async fn save(&self, folder: &str, file: UploadedFile) -> Result<String, AppError> {
        let target_dir = self.dir.join(folder);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {e}")))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(&file.content_type));
        tokio::fs::write(target_dir.join(&file_name), &file.data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store upload: {e}")))?;

        tracing::info!(folder, file_name, bytes = file.data.len(), "Stored upload");
        Ok(format!("{PUBLIC_PREFIX}/{folder}/{file_name}"))
    }
}
