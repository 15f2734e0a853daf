use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::auth::AuthenticatedUser,
    services::progress::ProgressService,
    AppState,
};

pub async fn student_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let courses = ProgressService::student_progress(&state.db, user.account_id).await?;
    Ok(Json(json!({ "courses": courses })))
}

pub async fn view_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let view = ProgressService::open_resource(&state.db, user.account_id, id).await?;
    Ok(Json(json!(view)))
}

pub async fn complete_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let progress = ProgressService::complete_for_account(&state.db, user.account_id, id).await?;
    Ok(Json(json!({
        "progress": progress,
        "redirect": format!("/resource/{id}"),
    })))
}

/// Teacher view: every student's completion per owned course.
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let courses = ProgressService::teacher_dashboard(&state.db, user.account_id).await?;
    Ok(Json(json!({ "courses": courses })))
}
