use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{course::Course, enrollment::Enrollment};

/// A dated class meeting of a course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassSession {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub held_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionListItem {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub title: String,
    pub held_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub session_id: Uuid,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttendanceEntry {
    pub enrollment_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct AttendanceSheet {
    pub session: ClassSession,
    pub entries: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub attendance_percentage: f64,
    pub issued_on: NaiveDate,
    pub file_path: Option<String>,
}

/// Certificate standing of one enrollment.
#[derive(Debug, Serialize)]
pub struct CertificateStatus {
    pub course: Course,
    pub enrollment: Enrollment,
    pub attendance_percentage: f64,
    pub eligible: bool,
    pub certificate: Option<Certificate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub course_id: Uuid,
    pub title: String,
    pub held_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct TakeAttendanceRequest {
    #[serde(default)]
    pub present: Vec<Uuid>,
}
