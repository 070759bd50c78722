//! Redis-backed `Cache` (`SET key value EX ttl`, `GET key`, `PING`).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;
use tracing::debug;

use atlaserp_ai::{Cache, CacheError};

/// Shared cache in Redis. The connection is opened on first use and reused.
pub struct RedisCache {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl core::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisCache")
            .field("connected", &self.connection.initialized())
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(backend)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                debug!("opening redis connection");
                self.client.get_multiplexed_async_connection().await
            })
            .await
            .map_err(backend)?;
        Ok(conn.clone())
    }
}

fn backend(err: redis::RedisError) -> CacheError {
    CacheError::Backend(err.to_string())
}

/// `EX` takes whole seconds and rejects 0.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let pong = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(backend)?;
        if pong != "PONG" {
            return Err(CacheError::Backend(format!("unexpected PING reply: {pong}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_down_but_never_to_zero() {
        assert_eq!(ttl_secs(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 1);
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
    }

    #[test]
    fn invalid_url_is_a_backend_error() {
        let err = RedisCache::new("not a url").unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn unreachable_server_fails_health_check() {
        let cache = RedisCache::new("redis://127.0.0.1:1/").unwrap();
        assert!(cache.health_check().await.is_err());
    }
}
