use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_platform_api::{config::Config, db, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    tokio::fs::create_dir_all(&config.media_dir).await?;

    // Connections are opened per use; this only validates the URL.
    let redis = redis::Client::open(config.redis_url.as_str())?;

    let state = AppState {
        db: pool,
        redis,
        config: config.clone(),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("course platform API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
