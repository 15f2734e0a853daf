use axum::extract::Multipart;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult, FieldErrors},
    models::{
        material::{ExtraMaterial, MaterialUpload, MaterialView},
        resource::{CreateResourceRequest, MATERIAL_FILE_TYPE},
    },
    services::{courses::CourseService, storage},
    validation,
};

const MATERIALS_SUBDIR: &str = "materials";

pub fn validate_upload(upload: &MaterialUpload, max_bytes: usize) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::required_text(&mut errors, "title", &upload.title, 100);
    match &upload.file {
        None => errors.add("file", "No file was submitted."),
        Some(file) if file.bytes.is_empty() => errors.add("file", "The submitted file is empty."),
        Some(file) if file.bytes.len() > max_bytes => errors.add(
            "file",
            format!("The file exceeds the {} MB limit.", max_bytes / (1024 * 1024)),
        ),
        Some(_) => {}
    }
    errors
}

/// The catalog entry that makes an uploaded material show up in progress tracking.
pub fn mirrored_resource(material: &ExtraMaterial, url: String) -> CreateResourceRequest {
    CreateResourceRequest {
        title: material.title.clone(),
        description: material.description.clone(),
        file_type: MATERIAL_FILE_TYPE.to_string(),
        link: url,
    }
}

pub struct MaterialService;

impl MaterialService {
    pub async fn read_upload(mut multipart: Multipart) -> AppResult<MaterialUpload> {
        let mut upload = MaterialUpload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => upload.file = Some(storage::read_file_field(field, "material").await?),
                "title" => upload.title = field.text().await?,
                "description" => upload.description = field.text().await?,
                _ => {}
            }
        }
        Ok(upload)
    }

    pub async fn list(pool: &PgPool, config: &Config, course_id: Uuid) -> AppResult<Vec<MaterialView>> {
        CourseService::get(pool, course_id).await?;
        let materials = sqlx::query_as::<_, ExtraMaterial>(
            "SELECT * FROM extra_materials WHERE course_id = $1 ORDER BY uploaded_at DESC",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;
        Ok(materials
            .into_iter()
            .map(|material| MaterialView {
                url: config.media_url(&material.storage_path),
                material,
            })
            .collect())
    }

    /// Store the file, record the material and its mirrored resource.
    pub async fn publish(
        pool: &PgPool,
        config: &Config,
        account_id: Uuid,
        course_id: Uuid,
        upload: MaterialUpload,
    ) -> AppResult<MaterialView> {
        let (teacher, course) = CourseService::require_owner(pool, account_id, course_id).await?;
        validate_upload(&upload, config.max_upload_mb * 1024 * 1024).into_result()?;
        let Some(file) = upload.file else {
            return Err(AppError::invalid("file", "No file was submitted."));
        };

        let rel_path = storage::storage_path(MATERIALS_SUBDIR, &file.filename);
        storage::save(&config.media_dir, &rel_path, &file.bytes).await?;

        let recorded = Self::record(
            pool,
            config,
            teacher.id,
            course.id,
            upload.title.trim(),
            upload.description.trim(),
            &rel_path,
            &file.filename,
            &file.content_type,
            file.bytes.len() as i64,
        )
        .await;

        match recorded {
            Ok(view) => {
                tracing::info!(
                    "material {} published to course {} ({} bytes)",
                    view.material.id,
                    course.id,
                    view.material.size_bytes
                );
                Ok(view)
            }
            Err(e) => {
                if let Err(cleanup) = storage::remove(&config.media_dir, &rel_path).await {
                    tracing::warn!("could not remove orphaned upload {rel_path}: {cleanup}");
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        pool: &PgPool,
        config: &Config,
        teacher_id: Uuid,
        course_id: Uuid,
        title: &str,
        description: &str,
        rel_path: &str,
        original_filename: &str,
        content_type: &str,
        size_bytes: i64,
    ) -> AppResult<MaterialView> {
        let mut tx = pool.begin().await?;

        let material = sqlx::query_as::<_, ExtraMaterial>(
            "INSERT INTO extra_materials
             (teacher_id, course_id, title, description, storage_path, original_filename, content_type, size_bytes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(teacher_id)
        .bind(course_id)
        .bind(title)
        .bind(description)
        .bind(rel_path)
        .bind(original_filename)
        .bind(content_type)
        .bind(size_bytes)
        .fetch_one(&mut *tx)
        .await?;

        let url = config.media_url(&material.storage_path);
        let resource = mirrored_resource(&material, url.clone());
        sqlx::query(
            "INSERT INTO resources (course_id, title, description, file_type, link)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(course_id)
        .bind(&resource.title)
        .bind(&resource.description)
        .bind(&resource.file_type)
        .bind(&resource.link)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(MaterialView { material, url })
    }

    /// Delete a material, the resources mirroring it and its stored file.
    /// Only the uploading teacher may do this. Returns the material's course id.
    pub async fn delete(
        pool: &PgPool,
        media_dir: &str,
        material_id: Uuid,
        account_id: Uuid,
    ) -> AppResult<Uuid> {
        // Title and course must be read before the row goes away.
        let material = sqlx::query_as::<_, ExtraMaterial>(
            "SELECT * FROM extra_materials WHERE id = $1",
        )
        .bind(material_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Material"))?;

        let owner_account: Uuid =
            sqlx::query_scalar("SELECT account_id FROM teachers WHERE id = $1")
                .bind(material.teacher_id)
                .fetch_one(pool)
                .await?;
        if owner_account != account_id {
            return Err(AppError::forbidden(
                "You do not have permission to delete this material.",
            ));
        }

        let mut tx = pool.begin().await?;
        let removed = sqlx::query("DELETE FROM resources WHERE title = $1 AND course_id = $2")
            .bind(&material.title)
            .bind(material.course_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM extra_materials WHERE id = $1")
            .bind(material.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        storage::remove(media_dir, &material.storage_path).await?;
        tracing::info!(
            "material {} deleted with {removed} mirrored resource(s)",
            material.id
        );
        Ok(material.course_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::material::UploadedFile;

    fn upload(title: &str, bytes: Vec<u8>) -> MaterialUpload {
        MaterialUpload {
            title: title.into(),
            description: String::new(),
            file: Some(UploadedFile {
                filename: "guide.pdf".into(),
                content_type: "application/pdf".into(),
                bytes,
            }),
        }
    }

    #[test]
    fn upload_requires_title_and_non_empty_file() {
        assert!(validate_upload(&upload("Guide", vec![1, 2, 3]), 1024).is_empty());
        assert!(validate_upload(&upload("", vec![1]), 1024).contains("title"));
        assert!(validate_upload(&upload("Guide", vec![]), 1024).contains("file"));

        let mut missing = upload("Guide", vec![1]);
        missing.file = None;
        assert!(validate_upload(&missing, 1024).contains("file"));
    }

    #[test]
    fn upload_size_is_capped() {
        let errors = validate_upload(&upload("Guide", vec![0; 2048]), 1024);
        assert!(errors.contains("file"));
    }

    #[test]
    fn mirrored_resource_is_tagged_as_file() {
        let material = ExtraMaterial {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "Practice set 1".into(),
            description: "Exercises".into(),
            storage_path: "materials/abc.pdf".into(),
            original_filename: "set1.pdf".into(),
            content_type: "application/pdf".into(),
            size_bytes: 10,
            uploaded_at: Utc::now(),
        };
        let resource = mirrored_resource(&material, "/media/materials/abc.pdf".into());
        assert_eq!(resource.title, "Practice set 1");
        assert_eq!(resource.description, "Exercises");
        assert_eq!(resource.file_type, "Archivo");
        assert_eq!(resource.link, "/media/materials/abc.pdf");
    }
}
