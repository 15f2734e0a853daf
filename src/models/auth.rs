use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an account acts as a teacher or a student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    /// Landing page after login.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Teacher => "/dashboard",
            Role::Student => "/",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        };
        write!(f, "{s}")
    }
}

/// Claims embedded in the JWT access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account UUID
    pub username: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from the validated JWT by the axum extractor in `middleware::auth`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
}
