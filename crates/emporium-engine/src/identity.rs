//! # Identity Provider
//!
//! The engine's view of the external identity and role system.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine asks                          Identity system answers           │
//! │  ───────────                          ───────────────────────           │
//! │  current_user_id()          ────────► signed-in user, if any            │
//! │  is_in_role(user, "Owner")  ────────► global role membership            │
//! │  account_points(user)       ────────► loyalty balance                   │
//! │  email_confirmed(user)      ────────► discount eligibility              │
//! │  add_points(user, n)        ────────► accrual after checkout            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Points live with the identity, not the customer row.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user making the current request.
    async fn current_user_id(&self) -> EngineResult<Option<String>>;

    /// False for ids the provider has never registered.
    async fn user_exists(&self, user_id: &str) -> EngineResult<bool>;

    async fn is_in_role(&self, user_id: &str, role: &str) -> EngineResult<bool>;

    /// Loyalty balance; unknown users have 0.
    async fn account_points(&self, user_id: &str) -> EngineResult<i64>;

    async fn email_confirmed(&self, user_id: &str) -> EngineResult<bool>;

    async fn add_points(&self, user_id: &str, delta: i64) -> EngineResult<()>;
}

// =============================================================================
// In-memory implementation
// =============================================================================

#[derive(Debug, Clone, Default)]
struct UserRecord {
    roles: HashSet<String>,
    points: i64,
    email_confirmed: bool,
}

/// Identity provider backed by a map, for development and tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    users: RwLock<HashMap<String, UserRecord>>,
    current: RwLock<Option<String>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a user.
    pub async fn add_user(&self, user_id: &str, points: i64, email_confirmed: bool) {
        self.users.write().await.insert(
            user_id.to_string(),
            UserRecord {
                roles: HashSet::new(),
                points,
                email_confirmed,
            },
        );
    }

    pub async fn grant_role(&self, user_id: &str, role: &str) {
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .roles
            .insert(role.to_string());
    }

    pub async fn confirm_email(&self, user_id: &str) {
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .email_confirmed = true;
    }

    pub async fn sign_in(&self, user_id: &str) {
        *self.current.write().await = Some(user_id.to_string());
    }

    pub async fn sign_out(&self) {
        *self.current.write().await = None;
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn current_user_id(&self) -> EngineResult<Option<String>> {
        Ok(self.current.read().await.clone())
    }

    async fn user_exists(&self, user_id: &str) -> EngineResult<bool> {
        Ok(self.users.read().await.contains_key(user_id))
    }

    async fn is_in_role(&self, user_id: &str, role: &str) -> EngineResult<bool> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .map(|u| u.roles.contains(role))
            .unwrap_or(false))
    }

    async fn account_points(&self, user_id: &str) -> EngineResult<i64> {
        Ok(self.users.read().await.get(user_id).map(|u| u.points).unwrap_or(0))
    }

    async fn email_confirmed(&self, user_id: &str) -> EngineResult<bool> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .map(|u| u.email_confirmed)
            .unwrap_or(false))
    }

    async fn add_points(&self, user_id: &str, delta: i64) -> EngineResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| EngineError::Identity(format!("unknown user {user_id}")))?;
        user.points += delta;
        Ok(())
    }
}
