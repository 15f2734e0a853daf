pub mod auth;
pub mod courses;
pub mod enrollment;
pub mod health;
pub mod materials;
pub mod profile;
pub mod progress;
pub mod sessions;
