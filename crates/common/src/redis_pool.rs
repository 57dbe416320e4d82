use redis::Client;
use redis::aio::ConnectionManager;

/// Open a Redis connection manager and verify the server answers `PING`.
///
/// Each caller gets its own manager. The worker's wake listener issues blocking
/// commands, so it must not share a manager with request handlers.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let mut manager = ConnectionManager::new(client).await?;

    let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
    tracing::info!(reply = %pong, "Connected to Redis");
    Ok(manager)
}
