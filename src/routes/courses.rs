use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::auth::AuthenticatedUser,
    services::courses::CourseService,
    AppState,
};

pub async fn list_courses(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
) -> AppResult<Json<Value>> {
    let courses = CourseService::list(&state.db, user.map(|u| u.account_id)).await?;
    Ok(Json(json!({ "courses": courses })))
}

pub async fn course_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let detail = CourseService::detail(&state.db, id, user.account_id).await?;
    Ok(Json(json!(detail)))
}
