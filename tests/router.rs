//! Request handling that is decided before any query runs: authentication,
//! path parsing and static responses. The pool connects lazily and is never
//! used.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use course_platform_api::{
    models::{account::Account, auth::Role},
    router,
    services::auth::AuthService,
    AppState,
};

fn app() -> Router {
    let config = common::config("./media");
    let db = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .unwrap();
    let redis = redis::Client::open(config.redis_url.as_str()).unwrap();
    router(AppState {
        db,
        redis,
        config: Arc::new(config),
    })
}

fn token(role: Role) -> String {
    let account = Account {
        id: Uuid::new_v4(),
        username: "ana".into(),
        email: "ana@example.com".into(),
        password_hash: String::new(),
        first_name: "Ana".into(),
        last_name: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    AuthService::generate_access_token(&account, role, common::JWT_SECRET, 3600).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn progress_requires_a_token() {
    let response = app().oneshot(get("/progress", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Missing Authorization header");
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let response = app()
        .oneshot(get("/progress", Some("not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let account = Account {
        id: Uuid::new_v4(),
        username: "intruder".into(),
        email: "intruder@example.com".into(),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let forged =
        AuthService::generate_access_token(&account, Role::Teacher, "some-other-secret", 3600)
            .unwrap();

    let response = app()
        .oneshot(get("/dashboard", Some(&forged)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_rejects_a_bad_token_instead_of_going_anonymous() {
    let response = app().oneshot(get("/", Some("garbage"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn course_id_must_be_a_uuid() {
    let token = token(Role::Student);
    let response = app()
        .oneshot(get("/course/not-a-uuid", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registration_form_lists_password_rules() {
    let response = app().oneshot(get("/register", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["fields"][0], "username");
    assert_eq!(body["password_rules"].as_array().map(Vec::len), Some(3));
}
