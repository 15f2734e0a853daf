use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::{AppError, AppResult, FieldErrors},
    models::{
        account::{
            Account, AccountSummary, ChangePasswordRequest, LoginResponse, RegisterRequest,
        },
        auth::{Claims, Role},
    },
    validation,
};

const BCRYPT_COST: u32 = 12;

const ACCOUNT_COLS: &str =
    "id, username, email, password_hash, first_name, last_name, created_at, updated_at";

/// Field-level checks for the registration form.
pub fn validate_registration(req: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::username(&mut errors, "username", &req.username);
    validation::email(&mut errors, "email", &req.email);
    validation::new_password(
        &mut errors,
        "password",
        &req.password,
        "password_confirm",
        &req.password_confirm,
        req.username.trim(),
    );
    errors
}

/// A unique violation on `accounts.username` becomes a field error.
pub fn username_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::invalid("username", "A user with that username already exists.")
    } else {
        e.into()
    }
}

pub struct AuthService;

impl AuthService {
    pub async fn find_account(pool: &PgPool, account_id: Uuid) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Account"))
    }

    /// An account is a teacher iff a teacher record points to it.
    pub async fn role_of(pool: &PgPool, account_id: Uuid) -> AppResult<Role> {
        let is_teacher: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM teachers WHERE account_id = $1)",
        )
        .bind(account_id)
        .fetch_one(pool)
        .await?;
        Ok(if is_teacher { Role::Teacher } else { Role::Student })
    }

    /// Create an account and log it in.
    pub async fn register(
        pool: &PgPool,
        req: &RegisterRequest,
        jwt_secret: &str,
        ttl_seconds: u64,
    ) -> AppResult<LoginResponse> {
        let mut errors = validate_registration(req);
        let username = req.username.trim();

        if !errors.contains("username") {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1)",
            )
            .bind(username)
            .fetch_one(pool)
            .await?;
            if taken {
                errors.add("username", "A user with that username already exists.");
            }
        }
        errors.into_result()?;

        let account = Self::create_account(pool, username, req.email.trim(), &req.password, "", "")
            .await?;
        tracing::info!("registered account {} ({})", account.username, account.id);

        let access_token =
            Self::generate_access_token(&account, Role::Student, jwt_secret, ttl_seconds)?;
        Ok(LoginResponse {
            access_token,
            account: AccountSummary::new(account, Role::Student),
            redirect: Role::Student.home_path(),
        })
    }

    /// Insert an account row. A username race is reported as a field error.
    pub async fn create_account<'e, E>(
        executor: E,
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<Account>
    where
        E: PgExecutor<'e>,
    {
        let hash = bcrypt::hash(password, BCRYPT_COST).map_err(anyhow::Error::from)?;
        sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (username, email, password_hash, first_name, last_name)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ACCOUNT_COLS}"
        ))
        .bind(username)
        .bind(email)
        .bind(&hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(executor)
        .await
        .map_err(username_conflict)
    }

    pub async fn login(
        pool: &PgPool,
        username: &str,
        password: &str,
        jwt_secret: &str,
        ttl_seconds: u64,
    ) -> AppResult<LoginResponse> {
        let invalid = || AppError::Unauthorized("Invalid username or password".into());

        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLS} FROM accounts WHERE username = $1"
        ))
        .bind(username.trim())
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;

        let valid = bcrypt::verify(password, &account.password_hash).map_err(|_| invalid())?;
        if !valid {
            tracing::info!("failed login for {}", account.username);
            return Err(invalid());
        }

        let role = Self::role_of(pool, account.id).await?;
        let access_token = Self::generate_access_token(&account, role, jwt_secret, ttl_seconds)?;
        Ok(LoginResponse {
            access_token,
            account: AccountSummary::new(account, role),
            redirect: role.home_path(),
        })
    }

    /// Change the password and hand back a fresh token so the caller stays logged in.
    pub async fn change_password(
        pool: &PgPool,
        account_id: Uuid,
        req: &ChangePasswordRequest,
        jwt_secret: &str,
        ttl_seconds: u64,
    ) -> AppResult<LoginResponse> {
        let account = Self::find_account(pool, account_id).await?;

        let mut errors = FieldErrors::new();
        let current_ok = bcrypt::verify(&req.current_password, &account.password_hash)
            .unwrap_or(false);
        if !current_ok {
            errors.add(
                "current_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        validation::new_password(
            &mut errors,
            "new_password",
            &req.new_password,
            "new_password_confirm",
            &req.new_password_confirm,
            &account.username,
        );
        errors.into_result()?;

        let new_hash = bcrypt::hash(&req.new_password, BCRYPT_COST).map_err(anyhow::Error::from)?;
        sqlx::query("UPDATE accounts SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&new_hash)
            .bind(account_id)
            .execute(pool)
            .await?;
        tracing::info!("password changed for account {account_id}");

        let role = Self::role_of(pool, account_id).await?;
        let access_token = Self::generate_access_token(&account, role, jwt_secret, ttl_seconds)?;
        Ok(LoginResponse {
            access_token,
            account: AccountSummary::new(account, role),
            redirect: "/profile",
        })
    }

    pub fn generate_access_token(
        account: &Account,
        role: Role,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }
}
