use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub course_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub enrolled_on: NaiveDate,
}

/// Result of a sign-up attempt. `created == false` means the account was
/// already enrolled and `enrollment` is the existing row.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollOutcome {
    pub enrollment: Enrollment,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrollmentForm {
    pub student_name: String,
    pub student_email: String,
}
