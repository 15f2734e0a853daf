use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{auth::AuthenticatedUser, enrollment::EnrollmentForm},
    services::{
        auth::AuthService,
        courses::CourseService,
        enrollment::{initial_form, EnrollmentService},
    },
    AppState,
};

pub async fn enroll_form(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let course = CourseService::get(&state.db, course_id).await?;
    if CourseService::teacher_for_account(&state.db, user.account_id).await?.is_some() {
        return Err(AppError::forbidden("Teachers cannot enroll in courses."));
    }
    let account = AuthService::find_account(&state.db, user.account_id).await?;
    Ok(Json(json!({ "course": course, "form": initial_form(&account) })))
}

pub async fn enroll(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(form): Json<EnrollmentForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let outcome = EnrollmentService::enroll(&state.db, user.account_id, course_id, &form).await?;
    let redirect = format!("/course/{course_id}");

    if outcome.created {
        Ok((
            StatusCode::CREATED,
            Json(json!({
                "message": "You have enrolled in the course!",
                "enrollment": outcome.enrollment,
                "redirect": redirect,
            })),
        ))
    } else {
        Ok((
            StatusCode::OK,
            Json(json!({
                "message": "You are already enrolled in this course.",
                "already_enrolled": true,
                "enrollment": outcome.enrollment,
                "redirect": redirect,
            })),
        ))
    }
}

pub async fn unenroll_confirm(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let course = CourseService::get(&state.db, course_id).await?;
    let enrollment = EnrollmentService::find(&state.db, user.account_id, course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("You are not enrolled in this course.".into()))?;
    Ok(Json(json!({ "course": course, "enrollment": enrollment })))
}

pub async fn unenroll(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let course = CourseService::get(&state.db, course_id).await?;
    EnrollmentService::withdraw(&state.db, user.account_id, course_id).await?;
    Ok(Json(json!({
        "message": format!("Your enrollment has been cancelled: {}.", course.title),
        "redirect": "/",
    })))
}
