use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::enrollment::Enrollment;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Teacher {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub specialty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Catalog row: a course flagged with the caller's enrollment.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseListItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub teacher_name: String,
    pub enrolled: bool,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub teacher: Teacher,
    pub enrollments: Vec<Enrollment>,
    pub is_teacher: bool,
    pub is_enrolled: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeacherRequest {
    pub name: String,
    pub email: String,
    pub specialty: String,
}
