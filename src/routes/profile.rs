use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    models::auth::AuthenticatedUser,
    services::profile::ProfileService,
    AppState,
};

pub async fn view_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let page = ProfileService::page(&state.db, &state.config, user.account_id).await?;
    Ok(Json(json!(page)))
}

pub async fn edit_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let edit = ProfileService::read_edit(multipart).await?;
    let page = ProfileService::edit(&state.db, &state.config, user.account_id, edit).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully!",
        "profile": page,
        "redirect": "/profile",
    })))
}
