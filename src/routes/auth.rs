use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::rate_limit::check_rate_limit,
    models::{
        account::{AccountSummary, ChangePasswordRequest, LoginRequest, RegisterRequest},
        auth::AuthenticatedUser,
    },
    services::auth::AuthService,
    validation::MIN_PASSWORD_LEN,
    AppState,
};

/// Extracts the real client IP from proxy-forwarded headers.
/// Priority: X-Real-IP → first X-Forwarded-For.
fn real_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    "unknown".to_string()
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    // Rate limit: 5 attempts per 15 min per username
    let rate_key = format!("rate:login:{}", body.username.trim().to_lowercase());
    check_rate_limit(&state.redis, &rate_key, 5, 900).await?;

    let response = AuthService::login(
        &state.db,
        &body.username,
        &body.password,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )
    .await?;
    Ok(Json(json!(response)))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let account = AuthService::find_account(&state.db, user.account_id).await?;
    let role = AuthService::role_of(&state.db, user.account_id).await?;
    Ok(Json(json!(AccountSummary::new(account, role))))
}

/// Where a freshly logged-in account should land.
pub async fn login_redirect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let role = AuthService::role_of(&state.db, user.account_id).await?;
    Ok(Json(json!({ "role": role, "redirect": role.home_path() })))
}

pub async fn register_form() -> Json<Value> {
    Json(json!({
        "fields": ["username", "email", "password", "password_confirm"],
        "password_rules": [
            format!("At least {MIN_PASSWORD_LEN} characters."),
            "Not entirely numeric.",
            "Not the same as the username.",
        ],
    }))
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    // Rate limit: 5 registrations/hour per IP
    let ip = real_ip(&headers);
    check_rate_limit(&state.redis, &format!("rate:register:ip:{ip}"), 5, 3600).await?;

    let response = AuthService::register(
        &state.db,
        &body,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!(response))))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let response = AuthService::change_password(
        &state.db,
        user.account_id,
        &body,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )
    .await?;
    Ok(Json(json!({
        "message": "Password changed successfully!",
        "access_token": response.access_token,
        "account": response.account,
        "redirect": response.redirect,
    })))
}
