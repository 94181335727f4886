use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Reduces a client-supplied file name to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    // Browsers on Windows may send the full client path.
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// Writes uploaded images under a fixed directory.
#[derive(Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Validates the name and stores the bytes, returning the stored file name.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        if filename.trim().is_empty() {
            return Err(AppError::InvalidInput("No file selected".to_string()));
        }
        if !allowed_file(filename) {
            return Err(AppError::InvalidInput(
                "Invalid file type. Only PNG, JPG, JPEG, and GIF are allowed.".to_string(),
            ));
        }

        let stored = format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(filename));
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&stored), bytes).await?;

        info!(file = %stored, bytes = bytes.len(), "Stored upload");
        Ok(stored)
    }
}
