use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{config::Config, middleware::auth::JwtSecret, routes};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: redis::Client,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let base = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        // Always allow localhost / 127.0.0.1 for local development
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base
    });
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    Router::new()
        .route("/health", get(routes::health::health_check))
        // Accounts
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/redirect", get(routes::auth::login_redirect))
        .route("/register", get(routes::auth::register_form).post(routes::auth::register))
        .route("/password/change", post(routes::auth::change_password))
        .route("/profile", get(routes::profile::view_profile))
        .route("/profile/edit", post(routes::profile::edit_profile))
        // Catalog and enrollment
        .route("/", get(routes::courses::list_courses))
        .route("/course/{id}", get(routes::courses::course_detail))
        .route("/course/{id}/enroll", get(routes::enrollment::enroll_form).post(routes::enrollment::enroll))
        .route("/course/{id}/unenroll", get(routes::enrollment::unenroll_confirm).post(routes::enrollment::unenroll))
        // Materials
        .route("/course/{id}/materials", get(routes::materials::list_materials).post(routes::materials::upload_material))
        .route("/material/{id}/delete", post(routes::materials::delete_material))
        // Progress
        .route("/progress", get(routes::progress::student_progress))
        .route("/resource/{id}", get(routes::progress::view_resource))
        .route("/resource/{id}/complete", post(routes::progress::complete_resource))
        .route("/dashboard", get(routes::progress::dashboard))
        // Sessions, attendance, certificates
        .route("/session/new", post(routes::sessions::create_session))
        .route("/sessions", get(routes::sessions::list_sessions))
        .route("/attendance/{session}", get(routes::sessions::attendance_sheet).post(routes::sessions::take_attendance))
        .route("/certificate/{account}", get(routes::sessions::certificates))
        .route("/certificate/issue/{enrollment}", post(routes::sessions::issue_certificate))
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Room for the form fields around a maximum-size file
        .layer(DefaultBodyLimit::max((config.max_upload_mb + 1) * 1024 * 1024))
        .with_state(state)
}
