pub mod attendance;
pub mod auth;
pub mod courses;
pub mod enrollment;
pub mod materials;
pub mod profile;
pub mod progress;
pub mod scoring;
pub mod storage;
