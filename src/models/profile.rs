use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{account::AccountSummary, course::{Course, Teacher}, material::UploadedFile};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: Uuid,
    pub avatar_path: Option<String>,
    pub biography: Option<String>,
    pub native_language: Option<String>,
    pub interests: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub avatar_url: String,
    pub biography: Option<String>,
    pub native_language: Option<String>,
    pub interests: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Completed,
    Incomplete,
}

#[derive(Debug, Serialize)]
pub struct MaterialStatus {
    pub id: Uuid,
    pub title: String,
    pub status: ResourceStatus,
}

#[derive(Debug, Serialize)]
pub struct CourseInfo {
    pub course_title: String,
    pub materials: Vec<MaterialStatus>,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfilePage {
    Teacher {
        account: AccountSummary,
        teacher: Teacher,
        profile: ProfileView,
        courses: Vec<Course>,
    },
    Student {
        account: AccountSummary,
        profile: ProfileView,
        courses: Vec<CourseInfo>,
    },
}

/// Fields read from the profile edit form. `None` leaves the value untouched.
#[derive(Debug, Default)]
pub struct ProfileEdit {
    pub username: Option<String>,
    pub email: Option<String>,
    pub biography: Option<String>,
    pub native_language: Option<String>,
    pub interests: Option<String>,
    pub avatar: Option<UploadedFile>,
}
