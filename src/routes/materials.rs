use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::auth::AuthenticatedUser,
    services::{courses::CourseService, materials::MaterialService},
    AppState,
};

pub async fn list_materials(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let course = CourseService::get(&state.db, course_id).await?;
    let materials = MaterialService::list(&state.db, &state.config, course_id).await?;
    Ok(Json(json!({ "course": course, "materials": materials })))
}

pub async fn upload_material(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let upload = MaterialService::read_upload(multipart).await?;
    let material =
        MaterialService::publish(&state.db, &state.config, user.account_id, course_id, upload)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Material uploaded.",
            "material": material,
            "redirect": format!("/course/{course_id}/materials"),
        })),
    ))
}

pub async fn delete_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let course_id =
        MaterialService::delete(&state.db, &state.config.media_dir, id, user.account_id).await?;
    Ok(Json(json!({
        "message": "Material deleted.",
        "redirect": format!("/course/{course_id}/materials"),
    })))
}
