#![allow(dead_code)]

use chrono::NaiveDate;
use sqlx::PgPool;

use course_platform_api::{
    config::Config,
    models::{
        account::Account,
        course::{Course, CreateCourseRequest, CreateTeacherRequest, Teacher},
        enrollment::{Enrollment, EnrollmentForm},
        resource::{CreateResourceRequest, Resource},
    },
    services::{auth::AuthService, courses::CourseService, enrollment::EnrollmentService},
};

pub const JWT_SECRET: &str = "integration-test-secret";

pub fn config(media_dir: &str) -> Config {
    Config {
        database_url: "postgres://localhost/course_platform_test".into(),
        redis_url: "redis://127.0.0.1:6379".into(),
        jwt_secret: JWT_SECRET.into(),
        jwt_expiry_seconds: 3600,
        media_dir: media_dir.into(),
        media_base_url: "/media".into(),
        default_avatar_url: "/media/profiles/default.jpg".into(),
        max_upload_mb: 1,
        certificate_threshold: 80.0,
        host: "127.0.0.1".into(),
        port: 0,
        app_base_url: "http://localhost".into(),
    }
}

pub async fn account(pool: &PgPool, username: &str) -> anyhow::Result<Account> {
    let account = AuthService::create_account(
        pool,
        username,
        &format!("{username}@example.com"),
        "correct-horse-battery",
        username,
        "",
    )
    .await?;
    Ok(account)
}

pub async fn teacher(pool: &PgPool, username: &str) -> anyhow::Result<(Account, Teacher)> {
    let created = CourseService::create_teacher_account(
        pool,
        username,
        "correct-horse-battery",
        &CreateTeacherRequest {
            name: username.into(),
            email: format!("{username}@school.example"),
            specialty: "Languages".into(),
        },
    )
    .await?;
    Ok(created)
}

pub async fn course(pool: &PgPool, teacher: &Teacher, title: &str) -> anyhow::Result<Course> {
    let course = CourseService::create(
        pool,
        teacher.id,
        &CreateCourseRequest {
            title: title.into(),
            description: format!("{title}: weekly lessons and exercises"),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 27).unwrap(),
        },
    )
    .await?;
    Ok(course)
}

pub async fn resource(pool: &PgPool, course: &Course, title: &str) -> anyhow::Result<Resource> {
    let resource = CourseService::add_resource(
        pool,
        course.id,
        &CreateResourceRequest {
            title: title.into(),
            description: String::new(),
            file_type: "Enlace".into(),
            link: format!("https://example.com/{}", title.replace(' ', "-")),
        },
    )
    .await?;
    Ok(resource)
}

pub fn form(account: &Account) -> EnrollmentForm {
    EnrollmentForm {
        student_name: account.username.clone(),
        student_email: account.email.clone(),
    }
}

pub async fn enroll(pool: &PgPool, account: &Account, course: &Course) -> anyhow::Result<Enrollment> {
    let outcome = EnrollmentService::enroll(pool, account.id, course.id, &form(account)).await?;
    Ok(outcome.enrollment)
}
