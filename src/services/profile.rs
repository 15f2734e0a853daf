use std::collections::HashSet;

use axum::extract::Multipart;
use image::imageops::FilterType;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult, FieldErrors},
    models::{
        account::AccountSummary,
        auth::Role,
        profile::{
            CourseInfo, MaterialStatus, Profile, ProfileEdit, ProfilePage, ProfileView,
            ResourceStatus,
        },
    },
    services::{
        auth::{username_conflict, AuthService},
        courses::CourseService,
        enrollment::EnrollmentService,
        progress::ProgressService,
        storage,
    },
    validation,
};

const AVATAR_SIZE: u32 = 256;
const AVATARS_SUBDIR: &str = "profiles";

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn profile_view(profile: Option<&Profile>, config: &Config) -> ProfileView {
    let avatar_url = profile
        .and_then(|p| p.avatar_path.as_deref())
        .map(|path| config.media_url(path))
        .unwrap_or_else(|| config.default_avatar_url.clone());
    ProfileView {
        avatar_url,
        biography: profile.and_then(|p| p.biography.clone()),
        native_language: profile.and_then(|p| p.native_language.clone()),
        interests: profile.and_then(|p| p.interests.clone()),
    }
}

/// Decode an uploaded image and re-encode it as a bounded JPEG thumbnail.
pub fn avatar_thumbnail(bytes: &[u8]) -> AppResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|_| AppError::invalid("avatar", "Upload a valid image."))?;
    let thumb = img.resize(AVATAR_SIZE, AVATAR_SIZE, FilterType::Lanczos3).to_rgb8();
    let mut out = Vec::new();
    thumb
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)
        .map_err(anyhow::Error::from)?;
    Ok(out)
}

pub struct ProfileService;

impl ProfileService {
    pub async fn find(pool: &PgPool, account_id: Uuid) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(pool)
            .await?;
        Ok(profile)
    }

    pub async fn get_or_create(pool: &PgPool, account_id: Uuid) -> AppResult<Profile> {
        sqlx::query(
            "INSERT INTO profiles (account_id) VALUES ($1) ON CONFLICT (account_id) DO NOTHING",
        )
        .bind(account_id)
        .execute(pool)
        .await?;
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(pool)
            .await?;
        Ok(profile)
    }

    pub async fn page(pool: &PgPool, config: &Config, account_id: Uuid) -> AppResult<ProfilePage> {
        let account = AuthService::find_account(pool, account_id).await?;
        let profile = profile_view(Self::find(pool, account_id).await?.as_ref(), config);

        if let Some(teacher) = CourseService::teacher_for_account(pool, account_id).await? {
            let courses = CourseService::owned_by(pool, teacher.id).await?;
            return Ok(ProfilePage::Teacher {
                account: AccountSummary::new(account, Role::Teacher),
                teacher,
                profile,
                courses,
            });
        }

        let enrollments = EnrollmentService::for_account(pool, account_id).await?;
        let mut courses = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let course = CourseService::get(pool, enrollment.course_id).await?;
            let resources = CourseService::resources(pool, course.id).await?;
            let done: HashSet<Uuid> = ProgressService::completed_resource_ids(pool, enrollment.id)
                .await?
                .into_iter()
                .collect();
            let summary = ProgressService::completion(pool, enrollment.id).await?;

            let materials = resources
                .into_iter()
                .map(|r| MaterialStatus {
                    status: if done.contains(&r.id) {
                        ResourceStatus::Completed
                    } else {
                        ResourceStatus::Incomplete
                    },
                    id: r.id,
                    title: r.title,
                })
                .collect();
            courses.push(CourseInfo {
                course_title: course.title,
                materials,
                percentage: summary.percentage,
            });
        }

        Ok(ProfilePage::Student {
            account: AccountSummary::new(account, Role::Student),
            profile,
            courses,
        })
    }

    pub async fn read_edit(mut multipart: Multipart) -> AppResult<ProfileEdit> {
        let mut edit = ProfileEdit::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "avatar" => {
                    let file = storage::read_file_field(field, "avatar").await?;
                    if !file.bytes.is_empty() {
                        edit.avatar = Some(file);
                    }
                }
                "username" => edit.username = Some(field.text().await?),
                "email" => edit.email = Some(field.text().await?),
                "biography" => edit.biography = Some(field.text().await?),
                "native_language" => edit.native_language = Some(field.text().await?),
                "interests" => edit.interests = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(edit)
    }

    /// Update the account's username/email and the profile fields.
    pub async fn edit(
        pool: &PgPool,
        config: &Config,
        account_id: Uuid,
        edit: ProfileEdit,
    ) -> AppResult<ProfilePage> {
        let account = AuthService::find_account(pool, account_id).await?;

        let mut errors = FieldErrors::new();
        let username = edit
            .username
            .as_deref()
            .map(str::trim)
            .unwrap_or(&account.username)
            .to_string();
        let email = edit
            .email
            .as_deref()
            .map(str::trim)
            .unwrap_or(&account.email)
            .to_string();
        validation::username(&mut errors, "username", &username);
        if !email.is_empty() && !validation::is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }
        if let Some(lang) = &edit.native_language {
            validation::max_length(&mut errors, "native_language", lang.trim(), 50);
        }
        if !errors.contains("username") && username != account.username {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1 AND id <> $2)",
            )
            .bind(&username)
            .bind(account_id)
            .fetch_one(pool)
            .await?;
            if taken {
                errors.add("username", "A user with that username already exists.");
            }
        }
        let avatar = match &edit.avatar {
            Some(file) => match avatar_thumbnail(&file.bytes) {
                Ok(bytes) => Some(bytes),
                Err(AppError::Validation(_)) => {
                    errors.add("avatar", "Upload a valid image.");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };
        errors.into_result()?;

        let profile = Self::get_or_create(pool, account_id).await?;

        let new_avatar_path = match avatar {
            Some(bytes) => {
                let rel = storage::storage_path(AVATARS_SUBDIR, "avatar.jpg");
                storage::save(&config.media_dir, &rel, &bytes).await?;
                Some(rel)
            }
            None => None,
        };

        let saved = async {
            let mut tx = pool.begin().await?;
            sqlx::query(
                "UPDATE accounts SET username = $1, email = $2, updated_at = NOW() WHERE id = $3",
            )
            .bind(&username)
            .bind(&email)
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(username_conflict)?;
            sqlx::query(
                "UPDATE profiles
                 SET avatar_path     = COALESCE($1, avatar_path),
                     biography       = CASE WHEN $2 THEN $3 ELSE biography END,
                     native_language = CASE WHEN $4 THEN $5 ELSE native_language END,
                     interests       = CASE WHEN $6 THEN $7 ELSE interests END,
                     updated_at      = NOW()
                 WHERE id = $8",
            )
            .bind(&new_avatar_path)
            .bind(edit.biography.is_some())
            .bind(edit.biography.and_then(non_empty))
            .bind(edit.native_language.is_some())
            .bind(edit.native_language.and_then(non_empty))
            .bind(edit.interests.is_some())
            .bind(edit.interests.and_then(non_empty))
            .bind(profile.id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<(), AppError>(())
        }
        .await;

        if let Err(e) = saved {
            if let Some(rel) = &new_avatar_path {
                if let Err(cleanup) = storage::remove(&config.media_dir, rel).await {
                    tracing::warn!("could not remove orphaned avatar {rel}: {cleanup}");
                }
            }
            return Err(e);
        }

        if let (Some(_), Some(old)) = (&new_avatar_path, &profile.avatar_path) {
            storage::remove(&config.media_dir, old).await?;
        }
        tracing::info!("profile updated for account {account_id}");

        Self::page(pool, config, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::test_config;

    #[test]
    fn default_avatar_when_unset() {
        let config = test_config("/tmp/media");
        let view = profile_view(None, &config);
        assert_eq!(view.avatar_url, "/media/profiles/default.jpg");

        let profile = Profile {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            avatar_path: Some("profiles/me.jpg".into()),
            biography: Some("Math lover".into()),
            native_language: None,
            interests: None,
            updated_at: Utc::now(),
        };
        let view = profile_view(Some(&profile), &config);
        assert_eq!(view.avatar_url, "/media/profiles/me.jpg");
        assert_eq!(view.biography.as_deref(), Some("Math lover"));
    }

    #[test]
    fn avatar_is_bounded_jpeg() {
        let img = image::RgbImage::from_pixel(800, 400, image::Rgb([10, 120, 200]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let jpeg = avatar_thumbnail(&png).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 256);
        assert_eq!(decoded.height(), 128);
    }

    #[test]
    fn avatar_rejects_non_images() {
        assert!(matches!(
            avatar_thumbnail(b"definitely not an image"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn blank_fields_become_none() {
        assert_eq!(non_empty("  ".into()), None);
        assert_eq!(non_empty(" Spanish ".into()), Some("Spanish".into()));
    }
}
