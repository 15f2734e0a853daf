use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub media_dir: String,
    /// Public prefix under which files in `media_dir` are reachable.
    pub media_base_url: String,
    pub default_avatar_url: String,
    pub max_upload_mb: usize,
    pub certificate_threshold: f64,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "86400".into())
                .parse()?,
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".into()),
            media_base_url: env::var("MEDIA_BASE_URL").unwrap_or_else(|_| "/media".into()),
            default_avatar_url: env::var("DEFAULT_AVATAR_URL")
                .unwrap_or_else(|_| "/media/profiles/default.jpg".into()),
            max_upload_mb: env::var("MAX_UPLOAD_MB")
                .unwrap_or_else(|_| "50".into())
                .parse()?,
            certificate_threshold: env::var("CERTIFICATE_THRESHOLD")
                .unwrap_or_else(|_| "80".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
        })
    }

    /// Public URL of a file stored under `media_dir`.
    pub fn media_url(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.media_base_url.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

#[cfg(test)]
pub(crate) fn test_config(media_dir: &str) -> Config {
    Config {
        database_url: "postgres://localhost/course_platform_test".into(),
        redis_url: "redis://127.0.0.1:6379".into(),
        jwt_secret: "test-secret".into(),
        jwt_expiry_seconds: 3600,
        media_dir: media_dir.into(),
        media_base_url: "/media/".into(),
        default_avatar_url: "/media/profiles/default.jpg".into(),
        max_upload_mb: 1,
        certificate_threshold: 80.0,
        host: "127.0.0.1".into(),
        port: 0,
        app_base_url: "http://localhost".into(),
    }
}
