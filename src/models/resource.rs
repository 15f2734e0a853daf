use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{course::Course, enrollment::Enrollment};

/// File-type tag given to resources that mirror an uploaded extra material.
pub const MATERIAL_FILE_TYPE: &str = "Archivo";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resource {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub file_type: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Progress {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub resource_id: Uuid,
    pub completed: bool,
    pub completed_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: String,
    pub file_type: String,
    pub link: String,
}

/// Completed and total resource counts for one enrollment.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CompletionSummary {
    pub total: i64,
    pub completed: i64,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct ResourceView {
    pub resource: Resource,
    pub completed: bool,
}

/// One course in a student's progress dashboard.
#[derive(Debug, Serialize)]
pub struct CourseProgress {
    pub course: Course,
    #[serde(flatten)]
    pub summary: CompletionSummary,
    pub resources: Vec<Resource>,
    pub completed_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StudentProgress {
    pub enrollment: Enrollment,
    #[serde(flatten)]
    pub summary: CompletionSummary,
}

/// One owned course in the teacher dashboard.
#[derive(Debug, Serialize)]
pub struct CourseStudents {
    pub course: Course,
    pub students: Vec<StudentProgress>,
}
