//! Redis substrate.

use std::fmt;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{Client, Cmd, Pipeline};
use tracing::{debug, info};

use super::{BackendFuture, KeyValueBackend, WriteBatch, WriteOp};
use crate::error::{Result, StoreError};
use crate::types::Order;

/// Redis-backed key/value + sorted-set store.
///
/// Holds a single multiplexed [`ConnectionManager`], which reconnects on its
/// own after transient failures. Cloning the manager is cheap and every call
/// works on its own clone, so concurrent callers never wait on each other.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    endpoint: String,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connects to the Redis server at `url` (`redis://host:port/db`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if the URL is invalid or the
    /// server cannot be reached within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(url)?;
        let endpoint = client.get_connection_info().addr.to_string();

        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                StoreError::backend(format!(
                    "timed out after {}s connecting to {endpoint}",
                    timeout.as_secs()
                ))
            })??;

        info!(endpoint = %endpoint, "connected to redis");
        Ok(Self { conn, endpoint })
    }

    /// Returns the server address this backend talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Closes the connection.
    ///
    /// Outstanding clones held by in-flight calls finish normally; the
    /// socket is released when the last one is dropped.
    pub fn close(self) {
        info!(endpoint = %self.endpoint, "closing redis connection");
        drop(self.conn);
    }

    fn pipeline(batch: &WriteBatch) -> Pipeline {
        let mut pipe = redis::pipe();
        for op in batch.ops() {
            match op {
                WriteOp::SetEx { key, value, ttl } => {
                    // EX must be at least one second.
                    pipe.cmd("SET")
                        .arg(key)
                        .arg(value.as_slice())
                        .arg("EX")
                        .arg(ttl.as_secs().max(1))
                        .ignore();
                }
                WriteOp::ZAdd { key, member, score } => {
                    pipe.cmd("ZADD").arg(key).arg(*score).arg(member).ignore();
                }
            }
        }
        pipe
    }

    fn range_cmd(key: &str, min: i64, max: i64, limit: usize, order: Order) -> Cmd {
        let mut cmd = match order {
            Order::Ascending => {
                let mut cmd = redis::cmd("ZRANGEBYSCORE");
                cmd.arg(key).arg(min).arg(max);
                cmd
            }
            Order::Descending => {
                let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
                cmd.arg(key).arg(max).arg(min);
                cmd
            }
        };
        cmd.arg("LIMIT").arg(0).arg(limit);
        cmd
    }
}

impl KeyValueBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn apply<'a>(&'a self, batch: &'a WriteBatch) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            if batch.is_empty() {
                return Ok(());
            }
            let mut conn = self.conn.clone();
            let (): () = Self::pipeline(batch).query_async(&mut conn).await?;
            debug!(ops = batch.len(), "applied redis pipeline");
            Ok(())
        })
    }

    fn get_many<'a>(&'a self, keys: &'a [String]) -> BackendFuture<'a, Vec<Option<Vec<u8>>>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(Vec::new());
            }
            let mut conn = self.conn.clone();
            let values: Vec<Option<Vec<u8>>> =
                redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
            Ok(values)
        })
    }

    fn zrem_below<'a>(&'a self, key: &'a str, threshold: i64) -> BackendFuture<'a, u64> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let removed: u64 = redis::cmd("ZREMRANGEBYSCORE")
                .arg(key)
                .arg("-inf")
                .arg(format!("({threshold}"))
                .query_async(&mut conn)
                .await?;
            Ok(removed)
        })
    }

    fn zrem_lowest<'a>(&'a self, key: &'a str, keep: usize) -> BackendFuture<'a, u64> {
        Box::pin(async move {
            // Ranks 0..=-(keep + 1) are everything but the `keep` highest.
            let stop = -(i64::try_from(keep).unwrap_or(i64::MAX - 1) + 1);
            let mut conn = self.conn.clone();
            let removed: u64 = redis::cmd("ZREMRANGEBYRANK")
                .arg(key)
                .arg(0)
                .arg(stop)
                .query_async(&mut conn)
                .await?;
            Ok(removed)
        })
    }

    fn zrange_by_score<'a>(
        &'a self,
        key: &'a str,
        min: i64,
        max: i64,
        limit: usize,
        order: Order,
    ) -> BackendFuture<'a, Vec<String>> {
        Box::pin(async move {
            if min > max || limit == 0 {
                return Ok(Vec::new());
            }
            let mut conn = self.conn.clone();
            let members: Vec<String> = Self::range_cmd(key, min, max, limit, order)
                .query_async(&mut conn)
                .await?;
            Ok(members)
        })
    }

    fn zcard<'a>(&'a self, key: &'a str) -> BackendFuture<'a, u64> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let count: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
            Ok(count)
        })
    }

    fn ping(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(cmd: &Cmd) -> String {
        String::from_utf8_lossy(&cmd.get_packed_command()).into_owned()
    }

    #[test]
    fn pipeline_keeps_record_before_index() {
        let mut batch = WriteBatch::new();
        batch
            .set_ex("alert:a", b"{}".to_vec(), Duration::from_secs(86_400))
            .zadd("alert:region:lazio", "a", 42);

        let packed = String::from_utf8_lossy(&RedisBackend::pipeline(&batch).get_packed_pipeline())
            .into_owned();
        let set_at = packed.find("SET").unwrap();
        let zadd_at = packed.find("ZADD").unwrap();
        assert!(set_at < zadd_at);
        assert!(packed.contains("86400"));
    }

    #[test]
    fn sub_second_ttl_is_rounded_up() {
        let mut batch = WriteBatch::new();
        batch.set_ex("k", b"v".to_vec(), Duration::from_millis(10));
        let packed = String::from_utf8_lossy(&RedisBackend::pipeline(&batch).get_packed_pipeline())
            .into_owned();
        assert!(packed.contains("$2\r\nEX\r\n$1\r\n1\r\n"));
    }

    #[test]
    fn descending_range_swaps_bounds() {
        let cmd = RedisBackend::range_cmd("idx", 10, 20, 5, Order::Descending);
        let packed = packed(&cmd);
        assert!(packed.contains("ZREVRANGEBYSCORE"));
        assert!(packed.find("20").unwrap() < packed.find("10").unwrap());
        assert!(packed.contains("LIMIT"));
    }

    #[test]
    fn ascending_range_keeps_bounds() {
        let cmd = RedisBackend::range_cmd("idx", 10, 20, 5, Order::Ascending);
        let packed = packed(&cmd);
        assert!(packed.contains("ZRANGEBYSCORE"));
        assert!(packed.find("10").unwrap() < packed.find("20").unwrap());
    }

    #[tokio::test]
    async fn connect_rejects_bad_url() {
        let err = RedisBackend::connect("not-a-url", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_backend_unavailable());
    }
}
