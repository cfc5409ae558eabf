//! # Session Store
//!
//! Key/value storage scoped to one browser session. Holds the guest
//! customer id and POS carts.
//!
//! ## Keys
//! ```text
//! guest_customer_id      → customer id (UTF-8)
//! pos_cart:{shop_id}     → JSON list of cart lines
//! ```

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use emporium_db::{Database, SessionRepository};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};

pub const GUEST_CUSTOMER_KEY: &str = "guest_customer_id";

/// Session key of the POS cart for one shop.
pub fn pos_cart_key(shop_id: &str) -> String {
    format!("pos_cart:{shop_id}")
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> EngineResult<()>;

    /// Absent keys are not an error.
    async fn remove(&self, key: &str) -> EngineResult<()>;
}

// =============================================================================
// In-memory session
// =============================================================================

/// A session that lives as long as the value.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> EngineResult<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> EngineResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// SQLite-backed session
// =============================================================================

/// A session persisted in `session_values`. Each write pushes the expiry
/// `ttl` past the clock's now.
pub struct SqliteSession {
    repo: SessionRepository,
    session_id: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SqliteSession {
    pub fn new(db: &Database, session_id: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        SqliteSession {
            repo: db.sessions(),
            session_id: session_id.into(),
            ttl,
            clock,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl std::fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("session_id", &self.session_id)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn session_error(err: emporium_db::DbError) -> EngineError {
    EngineError::Session(err.to_string())
}

#[async_trait]
impl SessionStore for SqliteSession {
    async fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        self.repo
            .get(&self.session_id, key, self.clock.now())
            .await
            .map_err(session_error)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> EngineResult<()> {
        let now = self.clock.now();
        self.repo
            .set(&self.session_id, key, &value, now + self.ttl, now)
            .await
            .map_err(session_error)
    }

    async fn remove(&self, key: &str) -> EngineResult<()> {
        self.repo
            .remove(&self.session_id, key)
            .await
            .map_err(session_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::Utc;
    use emporium_db::DbConfig;

    #[tokio::test]
    async fn test_memory_session() {
        let session = MemorySession::new();
        session.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(session.get("k").await.unwrap(), Some(b"v".to_vec()));
        session.remove("k").await.unwrap();
        session.remove("k").await.unwrap();
        assert!(session.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_session_expires() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let session = SqliteSession::new(&db, "browser-1", Duration::minutes(30), clock.clone());

        session.set(&pos_cart_key("shop-1"), b"[]".to_vec()).await.unwrap();
        assert!(session.get("pos_cart:shop-1").await.unwrap().is_some());

        clock.advance(Duration::minutes(31));
        assert!(session.get("pos_cart:shop-1").await.unwrap().is_none());
    }
}
