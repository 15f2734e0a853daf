use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        account::Account,
        enrollment::{EnrollOutcome, Enrollment, EnrollmentForm},
    },
    services::courses::CourseService,
    validation,
};

pub fn validate_enrollment_form(form: &EnrollmentForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::required_text(&mut errors, "student_name", &form.student_name, 100);
    validation::email(&mut errors, "student_email", &form.student_email);
    errors
}

/// Form defaults for a sign-up: the account's name and email.
pub fn initial_form(account: &Account) -> EnrollmentForm {
    EnrollmentForm {
        student_name: account.display_name(),
        student_email: account.email.clone(),
    }
}

pub struct EnrollmentService;

impl EnrollmentService {
    pub async fn find(
        pool: &PgPool,
        account_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE account_id = $1 AND course_id = $2",
        )
        .bind(account_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await?;
        Ok(enrollment)
    }

    pub async fn for_account(pool: &PgPool, account_id: Uuid) -> AppResult<Vec<Enrollment>> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE account_id = $1 ORDER BY enrolled_on",
        )
        .bind(account_id)
        .fetch_all(pool)
        .await?;
        Ok(enrollments)
    }

    pub async fn for_course(pool: &PgPool, course_id: Uuid) -> AppResult<Vec<Enrollment>> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE course_id = $1 ORDER BY student_name",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;
        Ok(enrollments)
    }

    /// Sign `account_id` up for `course_id`. Teachers are rejected. A second
    /// sign-up, including one that loses a concurrent race, returns the
    /// existing row with `created == false`.
    pub async fn enroll(
        pool: &PgPool,
        account_id: Uuid,
        course_id: Uuid,
        form: &EnrollmentForm,
    ) -> AppResult<EnrollOutcome> {
        CourseService::get(pool, course_id).await?;
        if CourseService::teacher_for_account(pool, account_id).await?.is_some() {
            return Err(AppError::forbidden("Teachers cannot enroll in courses."));
        }
        validate_enrollment_form(form).into_result()?;

        let inserted = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (account_id, course_id, student_name, student_email)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (account_id, course_id) DO NOTHING
             RETURNING *",
        )
        .bind(account_id)
        .bind(course_id)
        .bind(form.student_name.trim())
        .bind(form.student_email.trim())
        .fetch_optional(pool)
        .await?;

        if let Some(enrollment) = inserted {
            tracing::info!("account {account_id} enrolled in course {course_id}");
            return Ok(EnrollOutcome {
                enrollment,
                created: true,
            });
        }

        let existing = Self::find(pool, account_id, course_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!(
                "enrollment conflict for account {account_id} in course {course_id} but no row found"
            )))?;
        Ok(EnrollOutcome {
            enrollment: existing,
            created: false,
        })
    }

    /// Delete the account's enrollment; its progress, attendance and
    /// certificate rows go with it.
    pub async fn withdraw(pool: &PgPool, account_id: Uuid, course_id: Uuid) -> AppResult<Enrollment> {
        CourseService::get(pool, course_id).await?;
        let removed = sqlx::query_as::<_, Enrollment>(
            "DELETE FROM enrollments WHERE account_id = $1 AND course_id = $2 RETURNING *",
        )
        .bind(account_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("You are not enrolled in this course.".into()))?;
        tracing::info!("account {account_id} withdrew from course {course_id}");
        Ok(removed)
    }
}
