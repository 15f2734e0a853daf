//! Percentage arithmetic shared by the progress and attendance services.
//! Counts come from the database; nothing here touches it.

/// Attendance needed for a certificate unless configured otherwise.
pub const DEFAULT_CERTIFICATE_THRESHOLD: f64 = 80.0;

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn ratio_percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of a course's resources the student completed, rounded to 2 decimals.
pub fn completion_percentage(completed: i64, total_resources: i64) -> f64 {
    round2(ratio_percent(completed, total_resources))
}

/// Share of a course's sessions the student attended.
pub fn attendance_percentage(present: i64, total_sessions: i64) -> f64 {
    ratio_percent(present, total_sessions)
}

pub fn is_certificate_eligible(attendance_percentage: f64, threshold: f64) -> bool {
    attendance_percentage >= threshold
}
