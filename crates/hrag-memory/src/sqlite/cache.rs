use std::time::Duration;

use super::SqliteStore;
use crate::error::MemoryError;

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl SqliteStore {
    /// Fetch a cached value that has not yet expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn cache_get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM node_cache WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_secs())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn cache_put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), MemoryError> {
        let ttl = i64::try_from(ttl.as_secs())?;
        sqlx::query(
            "INSERT INTO node_cache (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(now_secs().saturating_add(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop expired entries. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn cache_purge_expired(&self) -> Result<u64, MemoryError> {
        let result = sqlx::query("DELETE FROM node_cache WHERE expires_at <= ?")
            .bind(now_secs())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
