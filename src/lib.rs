// Library exports for the API binary, the manage CLI and tests
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

pub use app::{router, AppState};
