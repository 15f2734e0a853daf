use crate::error::AppError;

/// Checks a counter-keyed rate limit stored in Redis.
///
/// Uses the INCR + EXPIRE strategy:
/// - Increments a counter for `key`
/// - On first increment, sets TTL to `window_secs`
/// - Returns `RateLimited` if counter exceeds `max_attempts`
///
/// An unreachable Redis lets the request through.
pub async fn check_rate_limit(
    client: &redis::Client,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), AppError> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("rate limit skipped for {key}: redis unavailable: {e}");
            return Ok(());
        }
    };

    let count: u64 = redis::cmd("INCR")
        .arg(key)
        .query_async(&mut conn)
        .await
        .unwrap_or(0);

    if count == 1 {
        // The window starts at the first attempt.
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(&mut conn)
            .await;
    }

    if count > max_attempts {
        tracing::info!("rate limit exceeded for {key}");
        return Err(AppError::RateLimited);
    }

    Ok(())
}
