pub mod account;
pub mod auth;
pub mod course;
pub mod enrollment;
pub mod material;
pub mod profile;
pub mod resource;
pub mod session;
