use std::path::{Component, Path, PathBuf};

use axum::extract::multipart::Field;
use uuid::Uuid;

use crate::{error::AppResult, models::material::UploadedFile};

/// Lowercased alphanumeric extension of `filename`, or "bin".
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string())
}

/// Relative storage path `<subdir>/<uuid>.<ext>` for a new upload.
pub fn storage_path(subdir: &str, original_filename: &str) -> String {
    format!("{}/{}.{}", subdir, Uuid::new_v4(), file_extension(original_filename))
}

/// Absolute path of a stored file; `None` if `relative` would leave `media_dir`.
pub fn resolve(media_dir: &str, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    let safe = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !safe || relative.is_empty() {
        return None;
    }
    Some(PathBuf::from(media_dir).join(rel))
}

/// Write `bytes` under `media_dir` at the relative path, creating directories.
pub async fn save(media_dir: &str, relative: &str, bytes: &[u8]) -> AppResult<()> {
    let full = resolve(media_dir, relative)
        .ok_or_else(|| anyhow::anyhow!("refusing to store outside media dir: {relative}"))?;
    if let Some(parent) = full.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&full, bytes).await?;
    Ok(())
}

/// Remove a stored file. A file that is already gone is not an error.
pub async fn remove(media_dir: &str, relative: &str) -> AppResult<()> {
    let Some(full) = resolve(media_dir, relative) else {
        tracing::warn!("skipping removal of unsafe path {relative}");
        return Ok(());
    };
    match tokio::fs::remove_file(&full).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("stored file already missing: {}", full.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read a multipart file field fully into memory.
pub async fn read_file_field(field: Field<'_>, fallback_name: &str) -> AppResult<UploadedFile> {
    let filename = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback_name)
        .to_string();
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .to_string()
        });
    let bytes = field.bytes().await?.to_vec();
    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}
