//! # Session Repository
//!
//! Per-session key/value storage with expiry. Backs guest customer ids
//! and POS carts when sessions outlive a single process.
//!
//! Expiry instants are unix epoch milliseconds; an expired row reads as
//! absent and is reclaimed by [`purge_expired`].

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

// =============================================================================
// Connection-level queries
// =============================================================================

/// Reads a live value.
pub async fn get_value(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    now: DateTime<Utc>,
) -> DbResult<Option<Vec<u8>>> {
    let value: Option<Vec<u8>> = sqlx::query_scalar(
        r#"
        SELECT value FROM session_values
        WHERE session_id = ?1 AND key = ?2 AND expires_at > ?3
        "#,
    )
    .bind(session_id)
    .bind(key)
    .bind(now.timestamp_millis())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(value)
}

/// Inserts or replaces a value.
pub async fn set_value(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    value: &[u8],
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(session_id = %session_id, key = %key, bytes = value.len(), "Writing session value");

    sqlx::query(
        r#"
        INSERT INTO session_values (session_id, key, value, expires_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (session_id, key) DO UPDATE SET
            value = excluded.value,
            expires_at = excluded.expires_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(session_id)
    .bind(key)
    .bind(value)
    .bind(expires_at.timestamp_millis())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Removes a value; removing an absent key is not an error.
pub async fn remove_value(conn: &mut SqliteConnection, session_id: &str, key: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM session_values WHERE session_id = ?1 AND key = ?2")
        .bind(session_id)
        .bind(key)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Deletes every expired row. Returns how many were removed.
pub async fn purge_expired(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM session_values WHERE expires_at <= ?1")
        .bind(now.timestamp_millis())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() > 0 {
        debug!(removed = result.rows_affected(), "Purged expired session values");
    }

    Ok(result.rows_affected())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for session values.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    pub async fn get(&self, session_id: &str, key: &str, now: DateTime<Utc>) -> DbResult<Option<Vec<u8>>> {
        let mut conn = self.pool.acquire().await?;
        get_value(&mut *conn, session_id, key, now).await
    }

    pub async fn set(
        &self,
        session_id: &str,
        key: &str,
        value: &[u8],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_value(&mut *conn, session_id, key, value, expires_at, now).await
    }

    pub async fn remove(&self, session_id: &str, key: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        remove_value(&mut *conn, session_id, key).await
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let mut conn = self.pool.acquire().await?;
        purge_expired(&mut *conn, now).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use chrono::Duration;

    #[tokio::test]
    async fn test_set_get_overwrite_remove() {
        let db = fixtures::db().await;
        let now = Utc::now();
        let later = now + Duration::hours(1);

        db.sessions().set("s-1", "cart", b"[]", later, now).await.unwrap();
        db.sessions().set("s-1", "cart", b"[1]", later, now).await.unwrap();
        assert_eq!(
            db.sessions().get("s-1", "cart", now).await.unwrap(),
            Some(b"[1]".to_vec())
        );

        // other sessions are isolated
        assert!(db.sessions().get("s-2", "cart", now).await.unwrap().is_none());

        db.sessions().remove("s-1", "cart").await.unwrap();
        db.sessions().remove("s-1", "cart").await.unwrap();
        assert!(db.sessions().get("s-1", "cart", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_values_read_as_absent() {
        let db = fixtures::db().await;
        let now = Utc::now();

        db.sessions()
            .set("s-1", "guest_customer_id", b"c-1", now + Duration::seconds(10), now)
            .await
            .unwrap();

        let after = now + Duration::seconds(11);
        assert!(db.sessions().get("s-1", "guest_customer_id", after).await.unwrap().is_none());
        assert_eq!(db.sessions().purge_expired(after).await.unwrap(), 1);
    }
}
