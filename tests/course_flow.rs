//! Database-backed checks of enrollment, progress, materials and certificates.
//!
//! Each test gets a fresh database with the migrations applied. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use std::time::Duration;

use chrono::{Days, NaiveDate};
use sqlx::PgPool;

use course_platform_api::{
    error::AppError,
    models::{
        course::CreateTeacherRequest,
        material::{MaterialUpload, UploadedFile},
        profile::ProfileEdit,
        session::CreateSessionRequest,
    },
    services::{
        attendance::AttendanceService, auth::AuthService, courses::CourseService,
        enrollment::EnrollmentService, materials::MaterialService, profile::ProfileService,
        progress::ProgressService,
    },
};

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn enrolling_twice_keeps_a_single_row(pool: PgPool) -> anyhow::Result<()> {
    let (_, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let student = common::account(&pool, "ana").await?;
    let form = common::form(&student);

    let first = EnrollmentService::enroll(&pool, student.id, course.id, &form).await?;
    let second = EnrollmentService::enroll(&pool, student.id, course.id, &form).await?;

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.enrollment.id, second.enrollment.id);
    assert_eq!(EnrollmentService::for_course(&pool, course.id).await?.len(), 1);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_sign_ups_create_one_enrollment(pool: PgPool) -> anyhow::Result<()> {
    let (_, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let student = common::account(&pool, "ana").await?;
    let form = common::form(&student);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let form = form.clone();
        let (account_id, course_id) = (student.id, course.id);
        handles.push(tokio::spawn(async move {
            EnrollmentService::enroll(&pool, account_id, course_id, &form).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await??.created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(EnrollmentService::for_course(&pool, course.id).await?.len(), 1);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn teacher_account_is_created_with_its_teacher_or_not_at_all(
    pool: PgPool,
) -> anyhow::Result<()> {
    common::teacher(&pool, "mrivera").await?;

    let duplicate_email = CourseService::create_teacher_account(
        &pool,
        "second",
        "correct-horse-battery",
        &CreateTeacherRequest {
            name: "Second".into(),
            email: "mrivera@school.example".into(),
            specialty: "Mathematics".into(),
        },
    )
    .await;
    assert!(matches!(duplicate_email, Err(AppError::Validation(ref f)) if f.contains("email")));

    let missing_specialty = CourseService::create_teacher_account(
        &pool,
        "third",
        "correct-horse-battery",
        &CreateTeacherRequest {
            name: "Third".into(),
            email: "third@school.example".into(),
            specialty: " ".into(),
        },
    )
    .await;
    assert!(matches!(missing_specialty, Err(AppError::Validation(ref f)) if f.contains("specialty")));

    let leftovers: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE username IN ('second', 'third')")
            .fetch_one(&pool)
            .await?;
    assert_eq!(leftovers, 0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn teachers_cannot_enroll(pool: PgPool) -> anyhow::Result<()> {
    let (owner, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;

    let result = EnrollmentService::enroll(&pool, owner.id, course.id, &common::form(&owner)).await;

    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    assert!(EnrollmentService::for_course(&pool, course.id).await?.is_empty());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn withdrawing_removes_the_enrollment(pool: PgPool) -> anyhow::Result<()> {
    let (_, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let student = common::account(&pool, "ana").await?;
    common::enroll(&pool, &student, &course).await?;

    EnrollmentService::withdraw(&pool, student.id, course.id).await?;
    assert!(EnrollmentService::find(&pool, student.id, course.id).await?.is_none());

    let again = EnrollmentService::withdraw(&pool, student.id, course.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn completion_counts_completed_resources(pool: PgPool) -> anyhow::Result<()> {
    let (_, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let empty = common::course(&pool, &teacher, "Spanish A2").await?;
    let student = common::account(&pool, "ana").await?;
    let enrollment = common::enroll(&pool, &student, &course).await?;
    let idle = common::enroll(&pool, &student, &empty).await?;

    let mut resources = Vec::new();
    for title in ["Alphabet", "Greetings", "Numbers", "Colours"] {
        resources.push(common::resource(&pool, &course, title).await?);
    }

    ProgressService::mark_complete(&pool, enrollment.id, resources[0].id).await?;
    ProgressService::mark_complete(&pool, enrollment.id, resources[1].id).await?;
    ProgressService::mark_complete(&pool, enrollment.id, resources[2].id).await?;
    // Completing again must not add a row.
    ProgressService::mark_complete(&pool, enrollment.id, resources[2].id).await?;

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress WHERE enrollment_id = $1")
        .bind(enrollment.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(rows, 3);

    let summary = ProgressService::completion(&pool, enrollment.id).await?;
    assert_eq!((summary.total, summary.completed), (4, 3));
    assert_eq!(ProgressService::percentage_complete(&pool, enrollment.id).await?, 75.0);
    assert_eq!(ProgressService::percentage_complete(&pool, idle.id).await?, 0.0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn opening_a_resource_starts_incomplete_progress(pool: PgPool) -> anyhow::Result<()> {
    let (_, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let resource = common::resource(&pool, &course, "Alphabet").await?;
    let student = common::account(&pool, "ana").await?;
    let outsider = common::account(&pool, "bruno").await?;
    common::enroll(&pool, &student, &course).await?;

    let view = ProgressService::open_resource(&pool, student.id, resource.id).await?;
    assert!(!view.completed);

    ProgressService::complete_for_account(&pool, student.id, resource.id).await?;
    let view = ProgressService::open_resource(&pool, student.id, resource.id).await?;
    assert!(view.completed);

    let denied = ProgressService::open_resource(&pool, outsider.id, resource.id).await;
    assert!(matches!(denied, Err(AppError::PermissionDenied(_))));
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_material_removes_its_resource_and_file(pool: PgPool) -> anyhow::Result<()> {
    let media = tempfile::tempdir()?;
    let media_dir = media.path().to_string_lossy().into_owned();
    let config = common::config(&media_dir);

    let (owner, teacher) = common::teacher(&pool, "mrivera").await?;
    let (other, _) = common::teacher(&pool, "jlopez").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let sibling = common::course(&pool, &teacher, "Spanish A2").await?;
    common::resource(&pool, &course, "Reading list").await?;
    // Same title in another course: not part of the material's pair.
    let namesake = common::resource(&pool, &sibling, "Week 1 slides").await?;

    let upload = MaterialUpload {
        title: "Week 1 slides".into(),
        description: "Greetings and introductions".into(),
        file: Some(UploadedFile {
            filename: "week1.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF-1.4 slides".to_vec(),
        }),
    };
    let view = MaterialService::publish(&pool, &config, owner.id, course.id, upload).await?;
    let stored = media.path().join(&view.material.storage_path);

    assert!(stored.exists());
    assert!(view.url.starts_with("/media/materials/"));
    let titles: Vec<String> = CourseService::resources(&pool, course.id)
        .await?
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert!(titles.contains(&"Week 1 slides".to_string()));
    assert_eq!(titles.len(), 2);

    let denied = MaterialService::delete(&pool, &media_dir, view.material.id, other.id).await;
    assert!(matches!(denied, Err(AppError::PermissionDenied(_))));
    assert!(stored.exists());

    let course_id = MaterialService::delete(&pool, &media_dir, view.material.id, owner.id).await?;
    assert_eq!(course_id, course.id);
    assert!(!stored.exists());

    let remaining = CourseService::resources(&pool, course.id).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Reading list");
    assert!(MaterialService::list(&pool, &config, course.id).await?.is_empty());

    let untouched = CourseService::resources(&pool, sibling.id).await?;
    assert_eq!(untouched.len(), 1);
    assert_eq!(untouched[0].id, namesake.id);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn certificates_follow_attendance(pool: PgPool) -> anyhow::Result<()> {
    let (owner, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let ana = common::account(&pool, "ana").await?;
    let bruno = common::account(&pool, "bruno").await?;
    let steady = common::enroll(&pool, &ana, &course).await?;
    let patchy = common::enroll(&pool, &bruno, &course).await?;

    let first_day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
    for week in 0..5u64 {
        let session = AttendanceService::create_session(
            &pool,
            owner.id,
            &CreateSessionRequest {
                course_id: course.id,
                title: format!("Week {}", week + 1),
                held_on: first_day + Days::new(7 * week),
            },
        )
        .await?;
        let present = match week {
            0..=2 => vec![steady.id, patchy.id],
            3 => vec![steady.id],
            _ => vec![],
        };
        AttendanceService::take_attendance(&pool, owner.id, session.id, &present).await?;
    }

    // 4 of 5 and 3 of 5 sessions attended.
    assert_eq!(AttendanceService::attendance_percentage(&pool, steady.id).await?, 80.0);
    assert_eq!(AttendanceService::attendance_percentage(&pool, patchy.id).await?, 60.0);
    assert!(AttendanceService::is_certificate_eligible(&pool, steady.id, 80.0).await?);
    assert!(!AttendanceService::is_certificate_eligible(&pool, patchy.id, 80.0).await?);

    let refused = AttendanceService::issue_certificate(&pool, patchy.id, 80.0).await;
    assert!(matches!(refused, Err(AppError::Validation(ref f)) if f.contains("attendance")));

    let issued = AttendanceService::issue_for_course(&pool, course.id, 80.0).await?;
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].enrollment_id, steady.id);
    assert_eq!(issued[0].attendance_percentage, 80.0);

    // A later absence lowers the live figure but not the issued certificate.
    let late = AttendanceService::create_session(
        &pool,
        owner.id,
        &CreateSessionRequest {
            course_id: course.id,
            title: "Week 6".into(),
            held_on: first_day + Days::new(35),
        },
    )
    .await?;
    AttendanceService::take_attendance(&pool, owner.id, late.id, &[]).await?;

    let live = AttendanceService::attendance_percentage(&pool, steady.id).await?;
    assert!((live - 400.0 / 6.0).abs() < 1e-9);
    let again = AttendanceService::issue_certificate(&pool, steady.id, 80.0).await?;
    assert_eq!(again.id, issued[0].id);
    assert_eq!(again.attendance_percentage, 80.0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn attendance_rejects_foreign_enrollments(pool: PgPool) -> anyhow::Result<()> {
    let (owner, teacher) = common::teacher(&pool, "mrivera").await?;
    let course = common::course(&pool, &teacher, "Spanish A1").await?;
    let other_course = common::course(&pool, &teacher, "Spanish A2").await?;
    let ana = common::account(&pool, "ana").await?;
    let stranger = common::enroll(&pool, &ana, &other_course).await?;

    let session = AttendanceService::create_session(
        &pool,
        owner.id,
        &CreateSessionRequest {
            course_id: course.id,
            title: "Week 1".into(),
            held_on: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        },
    )
    .await?;

    let result = AttendanceService::take_attendance(&pool, owner.id, session.id, &[stranger.id]).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

fn png() -> Vec<u8> {
    let mut out = Vec::new();
    image::RgbImage::new(8, 8)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn renaming_onto_a_username_claimed_meanwhile_is_a_field_error(
    pool: PgPool,
) -> anyhow::Result<()> {
    let media = tempfile::tempdir()?;
    let config = common::config(&media.path().to_string_lossy());
    let ana = common::account(&pool, "ana").await?;
    let bruno = common::account(&pool, "bruno").await?;

    // Ana takes the name in a transaction that is still open while Bruno's
    // edit passes its availability check.
    let mut claim = pool.begin().await?;
    sqlx::query("UPDATE accounts SET username = 'profesora' WHERE id = $1")
        .bind(ana.id)
        .execute(&mut *claim)
        .await?;

    let edit = ProfileEdit {
        username: Some("profesora".into()),
        avatar: Some(UploadedFile {
            filename: "me.png".into(),
            content_type: "image/png".into(),
            bytes: png(),
        }),
        ..Default::default()
    };
    let (edit_pool, edit_config, bruno_id) = (pool.clone(), config.clone(), bruno.id);
    let pending = tokio::spawn(async move {
        ProfileService::edit(&edit_pool, &edit_config, bruno_id, edit).await
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    claim.commit().await?;

    let result = pending.await?;
    assert!(matches!(result, Err(AppError::Validation(ref f)) if f.contains("username")));

    // No avatar left behind by the failed edit.
    let stored = std::fs::read_dir(media.path().join("profiles"))
        .map(|dir| dir.count())
        .unwrap_or(0);
    assert_eq!(stored, 0);
    assert_eq!(AuthService::find_account(&pool, bruno.id).await?.username, "bruno");
    Ok(())
}
