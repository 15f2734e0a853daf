use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        session::{CreateSessionRequest, TakeAttendanceRequest},
    },
    services::attendance::AttendanceService,
    AppState,
};

pub async fn create_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let session = AttendanceService::create_session(&state.db, user.account_id, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "session": session, "redirect": "/sessions" })),
    ))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let sessions = AttendanceService::list_sessions(&state.db, user.account_id).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn attendance_sheet(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let sheet = AttendanceService::attendance_sheet(&state.db, user.account_id, session_id).await?;
    Ok(Json(json!(sheet)))
}

pub async fn take_attendance(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(body): Json<TakeAttendanceRequest>,
) -> AppResult<Json<Value>> {
    let sheet =
        AttendanceService::take_attendance(&state.db, user.account_id, session_id, &body.present)
            .await?;
    Ok(Json(json!({ "message": "Attendance saved.", "sheet": sheet })))
}

pub async fn certificates(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let threshold = state.config.certificate_threshold;
    let statuses =
        AttendanceService::certificate_view(&state.db, user.account_id, account_id, threshold)
            .await?;
    Ok(Json(json!({ "threshold": threshold, "courses": statuses })))
}

pub async fn issue_certificate(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<Value>)> {
    let certificate = AttendanceService::issue_as_teacher(
        &state.db,
        user.account_id,
        enrollment_id,
        state.config.certificate_threshold,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "certificate": certificate }))))
}
