//! Administrative tasks that have no HTTP surface: creating teachers,
//! courses and resources, and issuing certificates in bulk.
//!
//! Usage: manage <COMMAND> [OPTIONS]   (reads DATABASE_URL from env / .env)

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use course_platform_api::{
    db,
    models::{
        course::{CreateCourseRequest, CreateTeacherRequest, Teacher},
        resource::CreateResourceRequest,
    },
    services::{
        attendance::AttendanceService, courses::CourseService,
        scoring::DEFAULT_CERTIFICATE_THRESHOLD,
    },
};

#[derive(Parser)]
#[command(name = "manage", about = "Administer the course platform database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a login account and its teacher record
    CreateTeacher {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        specialty: String,
    },
    /// Create a course owned by the teacher with the given email
    CreateCourse {
        #[arg(long)]
        teacher_email: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,
        /// YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,
    },
    /// Add a trackable resource to a course
    AddResource {
        #[arg(long)]
        course: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "Enlace")]
        file_type: String,
        #[arg(long)]
        link: String,
    },
    /// Issue certificates for every eligible enrollment of a course
    IssueCertificates {
        #[arg(long)]
        course: Uuid,
        #[arg(long, default_value_t = DEFAULT_CERTIFICATE_THRESHOLD)]
        threshold: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match args.command {
        Command::CreateTeacher {
            username,
            password,
            name,
            email,
            specialty,
        } => {
            let (account, teacher) = CourseService::create_teacher_account(
                &pool,
                &username,
                &password,
                &CreateTeacherRequest {
                    name,
                    email,
                    specialty,
                },
            )
            .await?;
            tracing::info!("Created teacher {} (account {})", teacher.id, account.id);
        }
        Command::CreateCourse {
            teacher_email,
            title,
            description,
            start,
            end,
        } => {
            let teacher = sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE email = $1")
                .bind(&teacher_email)
                .fetch_optional(&pool)
                .await?
                .with_context(|| format!("no teacher with email {teacher_email}"))?;
            let course = CourseService::create(
                &pool,
                teacher.id,
                &CreateCourseRequest {
                    title,
                    description,
                    start_date: start,
                    end_date: end,
                },
            )
            .await?;
            tracing::info!("Created course {} ({})", course.title, course.id);
        }
        Command::AddResource {
            course,
            title,
            description,
            file_type,
            link,
        } => {
            let resource = CourseService::add_resource(
                &pool,
                course,
                &CreateResourceRequest {
                    title,
                    description,
                    file_type,
                    link,
                },
            )
            .await?;
            tracing::info!("Added resource {} to course {}", resource.id, course);
        }
        Command::IssueCertificates { course, threshold } => {
            let issued = AttendanceService::issue_for_course(&pool, course, threshold).await?;
            for cert in &issued {
                tracing::info!(
                    "Certificate {} for enrollment {} ({:.2}%)",
                    cert.id,
                    cert.enrollment_id,
                    cert.attendance_percentage
                );
            }
            tracing::info!("{} certificate(s) issued for course {}", issued.len(), course);
        }
    }

    Ok(())
}
