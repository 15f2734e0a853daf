use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::resource::{
        CompletionSummary, CourseProgress, CourseStudents, Progress, Resource, ResourceView,
        StudentProgress,
    },
    services::{courses::CourseService, enrollment::EnrollmentService, scoring},
};

pub struct ProgressService;

impl ProgressService {
    /// Completed vs. total resources of the enrollment's course.
    pub async fn completion(pool: &PgPool, enrollment_id: Uuid) -> AppResult<CompletionSummary> {
        let (total, completed): (i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM resources r WHERE r.course_id = e.course_id),
                (SELECT COUNT(*) FROM progress p
                   JOIN resources r ON r.id = p.resource_id
                  WHERE p.enrollment_id = e.id
                    AND p.completed
                    AND r.course_id = e.course_id)
             FROM enrollments e
             WHERE e.id = $1",
        )
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Enrollment"))?;

        Ok(CompletionSummary {
            total,
            completed,
            percentage: scoring::completion_percentage(completed, total),
        })
    }

    pub async fn percentage_complete(pool: &PgPool, enrollment_id: Uuid) -> AppResult<f64> {
        Ok(Self::completion(pool, enrollment_id).await?.percentage)
    }

    pub async fn resource(pool: &PgPool, resource_id: Uuid) -> AppResult<Resource> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1")
            .bind(resource_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Resource"))
    }

    /// Get-or-create the progress row and flag it completed as of today.
    pub async fn mark_complete(
        pool: &PgPool,
        enrollment_id: Uuid,
        resource_id: Uuid,
    ) -> AppResult<Progress> {
        let today = Utc::now().date_naive();
        let progress = sqlx::query_as::<_, Progress>(
            "INSERT INTO progress (enrollment_id, resource_id, completed, completed_on)
             VALUES ($1, $2, TRUE, $3)
             ON CONFLICT (enrollment_id, resource_id)
             DO UPDATE SET completed = TRUE, completed_on = EXCLUDED.completed_on
             RETURNING *",
        )
        .bind(enrollment_id)
        .bind(resource_id)
        .bind(today)
        .fetch_one(pool)
        .await?;
        Ok(progress)
    }

    /// Mark a resource completed on behalf of the enrolled account.
    pub async fn complete_for_account(
        pool: &PgPool,
        account_id: Uuid,
        resource_id: Uuid,
    ) -> AppResult<Progress> {
        let resource = Self::resource(pool, resource_id).await?;
        let enrollment = EnrollmentService::find(pool, account_id, resource.course_id)
            .await?
            .ok_or_else(|| AppError::forbidden("You are not enrolled in this course."))?;
        Self::mark_complete(pool, enrollment.id, resource.id).await
    }

    /// Show a resource to an enrolled student, creating its progress row on
    /// first view.
    pub async fn open_resource(
        pool: &PgPool,
        account_id: Uuid,
        resource_id: Uuid,
    ) -> AppResult<ResourceView> {
        let resource = Self::resource(pool, resource_id).await?;
        let enrollment = EnrollmentService::find(pool, account_id, resource.course_id)
            .await?
            .ok_or_else(|| AppError::forbidden("You are not enrolled in this course."))?;

        sqlx::query(
            "INSERT INTO progress (enrollment_id, resource_id)
             VALUES ($1, $2)
             ON CONFLICT (enrollment_id, resource_id) DO NOTHING",
        )
        .bind(enrollment.id)
        .bind(resource.id)
        .execute(pool)
        .await?;

        let completed: bool = sqlx::query_scalar(
            "SELECT completed FROM progress WHERE enrollment_id = $1 AND resource_id = $2",
        )
        .bind(enrollment.id)
        .bind(resource.id)
        .fetch_one(pool)
        .await?;

        Ok(ResourceView { resource, completed })
    }

    pub async fn completed_resource_ids(pool: &PgPool, enrollment_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT resource_id FROM progress WHERE enrollment_id = $1 AND completed",
        )
        .bind(enrollment_id)
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Per-course completion for every course the account is enrolled in.
    pub async fn student_progress(pool: &PgPool, account_id: Uuid) -> AppResult<Vec<CourseProgress>> {
        let enrollments = EnrollmentService::for_account(pool, account_id).await?;
        let mut out = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let course = CourseService::get(pool, enrollment.course_id).await?;
            let summary = Self::completion(pool, enrollment.id).await?;
            let resources = CourseService::resources(pool, course.id).await?;
            let completed_ids = Self::completed_resource_ids(pool, enrollment.id).await?;
            out.push(CourseProgress {
                course,
                summary,
                resources,
                completed_ids,
            });
        }
        Ok(out)
    }

    /// Every student's completion in every course the teacher owns.
    pub async fn teacher_dashboard(pool: &PgPool, account_id: Uuid) -> AppResult<Vec<CourseStudents>> {
        let teacher = CourseService::require_teacher(pool, account_id).await?;
        let courses = CourseService::owned_by(pool, teacher.id).await?;

        let mut out = Vec::with_capacity(courses.len());
        for course in courses {
            let enrollments = EnrollmentService::for_course(pool, course.id).await?;
            let mut students = Vec::with_capacity(enrollments.len());
            for enrollment in enrollments {
                let summary = Self::completion(pool, enrollment.id).await?;
                students.push(StudentProgress { enrollment, summary });
            }
            out.push(CourseStudents { course, students });
        }
        Ok(out)
    }
}
