use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::{AppError, AppResult, FieldErrors},
    models::{
        account::Account,
        course::{Course, CourseDetail, CourseListItem, CreateCourseRequest, CreateTeacherRequest, Teacher},
        enrollment::Enrollment,
        resource::{CreateResourceRequest, Resource},
    },
    services::auth::AuthService,
    validation,
};

pub fn validate_course(req: &CreateCourseRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::required_text(&mut errors, "title", &req.title, 200);
    validation::required_text(&mut errors, "description", &req.description, usize::MAX);
    if req.start_date > req.end_date {
        errors.add("end_date", "The end date must not be before the start date.");
    }
    errors
}

pub fn validate_teacher(req: &CreateTeacherRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::required_text(&mut errors, "name", &req.name, 100);
    validation::email(&mut errors, "email", &req.email);
    validation::required_text(&mut errors, "specialty", &req.specialty, 100);
    errors
}

pub struct CourseService;

impl CourseService {
    /// All courses, each flagged with whether `account_id` is enrolled.
    pub async fn list(pool: &PgPool, account_id: Option<Uuid>) -> AppResult<Vec<CourseListItem>> {
        let courses = sqlx::query_as::<_, CourseListItem>(
            "SELECT c.id, c.title, c.description, c.start_date, c.end_date,
                    t.name AS teacher_name,
                    EXISTS(
                        SELECT 1 FROM enrollments e
                        WHERE e.course_id = c.id AND e.account_id = $1
                    ) AS enrolled
             FROM courses c
             JOIN teachers t ON t.id = c.teacher_id
             ORDER BY c.start_date, c.title",
        )
        .bind(account_id)
        .fetch_all(pool)
        .await?;
        Ok(courses)
    }

    pub async fn get(pool: &PgPool, course_id: Uuid) -> AppResult<Course> {
        sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Course"))
    }

    pub async fn detail(pool: &PgPool, course_id: Uuid, account_id: Uuid) -> AppResult<CourseDetail> {
        let course = Self::get(pool, course_id).await?;
        let teacher = sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE id = $1")
            .bind(course.teacher_id)
            .fetch_one(pool)
            .await?;
        let enrollments = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE course_id = $1 ORDER BY enrolled_on, student_name",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;

        let is_teacher = Self::teacher_for_account(pool, account_id).await?.is_some();
        let is_enrolled = enrollments
            .iter()
            .any(|e| e.account_id == Some(account_id));

        Ok(CourseDetail {
            course,
            teacher,
            enrollments,
            is_teacher,
            is_enrolled,
        })
    }

    pub async fn teacher_for_account(pool: &PgPool, account_id: Uuid) -> AppResult<Option<Teacher>> {
        let teacher = sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(pool)
            .await?;
        Ok(teacher)
    }

    pub async fn require_teacher(pool: &PgPool, account_id: Uuid) -> AppResult<Teacher> {
        Self::teacher_for_account(pool, account_id)
            .await?
            .ok_or_else(|| AppError::forbidden("Only teachers can do this."))
    }

    /// The course, provided `account_id` is the teacher who owns it.
    pub async fn require_owner(
        pool: &PgPool,
        account_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<(Teacher, Course)> {
        let course = Self::get(pool, course_id).await?;
        let teacher = Self::require_teacher(pool, account_id).await?;
        if course.teacher_id != teacher.id {
            return Err(AppError::forbidden("You do not teach this course."));
        }
        Ok((teacher, course))
    }

    pub async fn owned_by(pool: &PgPool, teacher_id: Uuid) -> AppResult<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            "SELECT * FROM courses WHERE teacher_id = $1 ORDER BY start_date, title",
        )
        .bind(teacher_id)
        .fetch_all(pool)
        .await?;
        Ok(courses)
    }

    pub async fn resources(pool: &PgPool, course_id: Uuid) -> AppResult<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>(
            "SELECT * FROM resources WHERE course_id = $1 ORDER BY created_at, title",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;
        Ok(resources)
    }

    /// Attach a teacher record to an existing account.
    pub async fn create_teacher<'e, E>(
        executor: E,
        account_id: Uuid,
        req: &CreateTeacherRequest,
    ) -> AppResult<Teacher>
    where
        E: PgExecutor<'e>,
    {
        validate_teacher(req).into_result()?;

        sqlx::query_as::<_, Teacher>(
            "INSERT INTO teachers (account_id, name, email, specialty)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(account_id)
        .bind(req.name.trim())
        .bind(req.email.trim())
        .bind(req.specialty.trim())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid("email", "A teacher with this account or email already exists.")
            } else {
                e.into()
            }
        })
    }

    /// Create a login account together with its teacher record. Either both
    /// rows are written or neither is.
    pub async fn create_teacher_account(
        pool: &PgPool,
        username: &str,
        password: &str,
        req: &CreateTeacherRequest,
    ) -> AppResult<(Account, Teacher)> {
        let mut errors = validate_teacher(req);
        validation::username(&mut errors, "username", username.trim());
        if password.is_empty() {
            errors.add("password", "This field is required.");
        }
        errors.into_result()?;

        let mut tx = pool.begin().await?;
        let account = AuthService::create_account(
            &mut *tx,
            username.trim(),
            req.email.trim(),
            password,
            req.name.trim(),
            "",
        )
        .await?;
        let teacher = Self::create_teacher(&mut *tx, account.id, req).await?;
        tx.commit().await?;

        tracing::info!("created teacher {} for account {}", teacher.id, account.id);
        Ok((account, teacher))
    }

    pub async fn create(
        pool: &PgPool,
        teacher_id: Uuid,
        req: &CreateCourseRequest,
    ) -> AppResult<Course> {
        validate_course(req).into_result()?;
        let course = sqlx::query_as::<_, Course>(
            "INSERT INTO courses (teacher_id, title, description, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(teacher_id)
        .bind(req.title.trim())
        .bind(req.description.trim())
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_one(pool)
        .await?;
        tracing::info!("created course {} ({})", course.title, course.id);
        Ok(course)
    }

    pub async fn add_resource(
        pool: &PgPool,
        course_id: Uuid,
        req: &CreateResourceRequest,
    ) -> AppResult<Resource> {
        let mut errors = FieldErrors::new();
        validation::required_text(&mut errors, "title", &req.title, 200);
        validation::required_text(&mut errors, "file_type", &req.file_type, 50);
        validation::required_text(&mut errors, "link", &req.link, usize::MAX);
        errors.into_result()?;

        Self::get(pool, course_id).await?;
        let resource = sqlx::query_as::<_, Resource>(
            "INSERT INTO resources (course_id, title, description, file_type, link)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(course_id)
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(req.file_type.trim())
        .bind(req.link.trim())
        .fetch_one(pool)
        .await?;
        Ok(resource)
    }
}
