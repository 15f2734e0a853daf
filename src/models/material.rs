use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExtraMaterial {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub storage_path: String,
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// A material as returned to clients, with the public file URL resolved.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialView {
    #[serde(flatten)]
    pub material: ExtraMaterial,
    pub url: String,
}

/// An upload read from a multipart body, not yet stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialUpload {
    pub title: String,
    pub description: String,
    pub file: Option<UploadedFile>,
}
