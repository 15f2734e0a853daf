use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        enrollment::Enrollment,
        session::{
            AttendanceEntry, AttendanceSheet, Certificate, CertificateStatus, ClassSession,
            CreateSessionRequest, SessionListItem,
        },
    },
    services::{courses::CourseService, enrollment::EnrollmentService, scoring},
    validation,
};

/// Ids in `present` that are not enrollments of the session's course.
pub fn unknown_enrollments(present: &[Uuid], roster: &HashSet<Uuid>) -> Vec<Uuid> {
    present
        .iter()
        .filter(|id| !roster.contains(id))
        .copied()
        .collect()
}

pub struct AttendanceService;

impl AttendanceService {
    pub async fn create_session(
        pool: &PgPool,
        account_id: Uuid,
        req: &CreateSessionRequest,
    ) -> AppResult<ClassSession> {
        CourseService::require_owner(pool, account_id, req.course_id).await?;
        let mut errors = FieldErrors::new();
        validation::required_text(&mut errors, "title", &req.title, 200);
        errors.into_result()?;

        let session = sqlx::query_as::<_, ClassSession>(
            "INSERT INTO class_sessions (course_id, title, held_on)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(req.course_id)
        .bind(req.title.trim())
        .bind(req.held_on)
        .fetch_one(pool)
        .await?;
        tracing::info!("session {} created for course {}", session.id, session.course_id);
        Ok(session)
    }

    /// Teachers see sessions of the courses they own, students those of the
    /// courses they are enrolled in.
    pub async fn list_sessions(pool: &PgPool, account_id: Uuid) -> AppResult<Vec<SessionListItem>> {
        let sessions = match CourseService::teacher_for_account(pool, account_id).await? {
            Some(teacher) => {
                sqlx::query_as::<_, SessionListItem>(
                    "SELECT s.id, s.course_id, c.title AS course_title, s.title, s.held_on
                     FROM class_sessions s
                     JOIN courses c ON c.id = s.course_id
                     WHERE c.teacher_id = $1
                     ORDER BY s.held_on, c.title",
                )
                .bind(teacher.id)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SessionListItem>(
                    "SELECT s.id, s.course_id, c.title AS course_title, s.title, s.held_on
                     FROM class_sessions s
                     JOIN courses c ON c.id = s.course_id
                     JOIN enrollments e ON e.course_id = c.id
                     WHERE e.account_id = $1
                     ORDER BY s.held_on, c.title",
                )
                .bind(account_id)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(sessions)
    }

    pub async fn get_session(pool: &PgPool, session_id: Uuid) -> AppResult<ClassSession> {
        sqlx::query_as::<_, ClassSession>("SELECT * FROM class_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Session"))
    }

    pub async fn attendance_sheet(
        pool: &PgPool,
        account_id: Uuid,
        session_id: Uuid,
    ) -> AppResult<AttendanceSheet> {
        let session = Self::get_session(pool, session_id).await?;
        CourseService::require_owner(pool, account_id, session.course_id).await?;

        let entries = sqlx::query_as::<_, AttendanceEntry>(
            "SELECT e.id AS enrollment_id, e.student_name, e.student_email,
                    COALESCE(a.present, FALSE) AS present
             FROM enrollments e
             LEFT JOIN attendance a ON a.enrollment_id = e.id AND a.session_id = $1
             WHERE e.course_id = $2
             ORDER BY e.student_name",
        )
        .bind(session.id)
        .bind(session.course_id)
        .fetch_all(pool)
        .await?;

        Ok(AttendanceSheet { session, entries })
    }

    /// Record presence for every enrollment of the session's course: present
    /// iff listed in `present`.
    pub async fn take_attendance(
        pool: &PgPool,
        account_id: Uuid,
        session_id: Uuid,
        present: &[Uuid],
    ) -> AppResult<AttendanceSheet> {
        let session = Self::get_session(pool, session_id).await?;
        CourseService::require_owner(pool, account_id, session.course_id).await?;

        let roster: Vec<Enrollment> = EnrollmentService::for_course(pool, session.course_id).await?;
        let roster_ids: HashSet<Uuid> = roster.iter().map(|e| e.id).collect();
        let unknown = unknown_enrollments(present, &roster_ids);
        if !unknown.is_empty() {
            return Err(AppError::invalid(
                "present",
                format!("{} id(s) are not enrollments of this course.", unknown.len()),
            ));
        }
        let present: HashSet<Uuid> = present.iter().copied().collect();

        let mut tx = pool.begin().await?;
        for enrollment in &roster {
            sqlx::query(
                "INSERT INTO attendance (enrollment_id, session_id, present)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (enrollment_id, session_id)
                 DO UPDATE SET present = EXCLUDED.present",
            )
            .bind(enrollment.id)
            .bind(session.id)
            .bind(present.contains(&enrollment.id))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::info!(
            "attendance taken for session {}: {}/{} present",
            session.id,
            present.len(),
            roster.len()
        );

        Self::attendance_sheet(pool, account_id, session_id).await
    }

    pub async fn attendance_percentage(pool: &PgPool, enrollment_id: Uuid) -> AppResult<f64> {
        let (total, present): (i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM class_sessions s WHERE s.course_id = e.course_id),
                (SELECT COUNT(*) FROM attendance a
                   JOIN class_sessions s ON s.id = a.session_id
                  WHERE a.enrollment_id = e.id
                    AND a.present
                    AND s.course_id = e.course_id)
             FROM enrollments e
             WHERE e.id = $1",
        )
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Enrollment"))?;

        Ok(scoring::attendance_percentage(present, total))
    }

    pub async fn is_certificate_eligible(
        pool: &PgPool,
        enrollment_id: Uuid,
        threshold: f64,
    ) -> AppResult<bool> {
        let pct = Self::attendance_percentage(pool, enrollment_id).await?;
        Ok(scoring::is_certificate_eligible(pct, threshold))
    }

    pub async fn certificate_for(pool: &PgPool, enrollment_id: Uuid) -> AppResult<Option<Certificate>> {
        let certificate = sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE enrollment_id = $1",
        )
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await?;
        Ok(certificate)
    }

    /// Issue a certificate carrying the attendance percentage as of now. An
    /// already issued certificate is returned unchanged.
    pub async fn issue_certificate(
        pool: &PgPool,
        enrollment_id: Uuid,
        threshold: f64,
    ) -> AppResult<Certificate> {
        if let Some(existing) = Self::certificate_for(pool, enrollment_id).await? {
            return Ok(existing);
        }

        let pct = Self::attendance_percentage(pool, enrollment_id).await?;
        if !scoring::is_certificate_eligible(pct, threshold) {
            return Err(AppError::invalid(
                "attendance",
                format!("Attendance is {pct:.2}%, below the required {threshold:.0}%."),
            ));
        }

        sqlx::query(
            "INSERT INTO certificates (enrollment_id, attendance_percentage)
             VALUES ($1, $2)
             ON CONFLICT (enrollment_id) DO NOTHING",
        )
        .bind(enrollment_id)
        .bind(pct)
        .execute(pool)
        .await?;
        tracing::info!("certificate issued for enrollment {enrollment_id} at {pct:.2}%");

        Self::certificate_for(pool, enrollment_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("certificate for {enrollment_id} vanished")))
    }

    /// Issue on behalf of the teacher who owns the enrollment's course.
    pub async fn issue_as_teacher(
        pool: &PgPool,
        account_id: Uuid,
        enrollment_id: Uuid,
        threshold: f64,
    ) -> AppResult<Certificate> {
        let enrollment = sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = $1")
            .bind(enrollment_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Enrollment"))?;
        CourseService::require_owner(pool, account_id, enrollment.course_id).await?;
        Self::issue_certificate(pool, enrollment.id, threshold).await
    }

    /// Issue certificates for every eligible enrollment of a course.
    pub async fn issue_for_course(
        pool: &PgPool,
        course_id: Uuid,
        threshold: f64,
    ) -> AppResult<Vec<Certificate>> {
        CourseService::get(pool, course_id).await?;
        let mut issued = Vec::new();
        for enrollment in EnrollmentService::for_course(pool, course_id).await? {
            if Self::is_certificate_eligible(pool, enrollment.id, threshold).await? {
                issued.push(Self::issue_certificate(pool, enrollment.id, threshold).await?);
            }
        }
        Ok(issued)
    }

    /// Certificate standing of `target_account` in each course. Visible to the
    /// account itself, or to a teacher for the courses they own.
    pub async fn certificate_view(
        pool: &PgPool,
        viewer_id: Uuid,
        target_account: Uuid,
        threshold: f64,
    ) -> AppResult<Vec<CertificateStatus>> {
        let teacher = CourseService::teacher_for_account(pool, viewer_id).await?;
        if viewer_id != target_account && teacher.is_none() {
            return Err(AppError::forbidden("You cannot view these certificates."));
        }

        let mut out = Vec::new();
        for enrollment in EnrollmentService::for_account(pool, target_account).await? {
            let course = CourseService::get(pool, enrollment.course_id).await?;
            if viewer_id != target_account {
                if let Some(t) = &teacher {
                    if course.teacher_id != t.id {
                        continue;
                    }
                }
            }
            let attendance_percentage = Self::attendance_percentage(pool, enrollment.id).await?;
            let certificate = Self::certificate_for(pool, enrollment.id).await?;
            out.push(CertificateStatus {
                eligible: scoring::is_certificate_eligible(attendance_percentage, threshold),
                course,
                enrollment,
                attendance_percentage,
                certificate,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_enrollments_are_reported() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let roster: HashSet<Uuid> = [a, b].into_iter().collect();

        assert!(unknown_enrollments(&[a, b], &roster).is_empty());
        assert!(unknown_enrollments(&[], &roster).is_empty());
        assert_eq!(unknown_enrollments(&[a, stranger], &roster), vec![stranger]);
    }
}
