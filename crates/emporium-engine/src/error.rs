//! # Engine Error Type
//!
//! One error type for every engine operation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Emporium                               │
//! │                                                                         │
//! │  ValidationError / CoreError (core) ──┐                                │
//! │                                       │                                 │
//! │  DbError (db) ────────────────────────┼──► EngineError ──► kind()      │
//! │    NotFound  → NotFound               │                    │            │
//! │    Conflict  → Conflict (retried once)│                    ▼            │
//! │    other     → Database               │    HTTP layer picks a status   │
//! │                                       │    and a message               │
//! │  Engine checks (shortfall, auth, ...) ┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure inside checkout or restock happens before commit, so the
//! transaction is dropped and nothing persists.

use emporium_core::{CoreError, LocationKind, ValidationError};
use emporium_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// One line that cannot be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
    pub inventory_id: String,
    pub item_name: String,
    pub requested: i64,
    pub available: i64,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} requested, {} available)",
            self.item_name, self.requested, self.available
        )
    }
}

fn list_shortfalls(lines: &[Shortfall]) -> String {
    lines
        .iter()
        .map(Shortfall::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Engine operation errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input, rejected before any write.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A domain rule on cart contents was broken.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// One or more lines exceed the stock on hand. The cart is unchanged.
    #[error("Insufficient stock: {}", list_shortfalls(.lines))]
    StockShortfall { lines: Vec<Shortfall> },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Checked before any other validation.
    #[error("{actor} is not allowed to {action}")]
    Unauthorized { actor: String, action: String },

    /// Lost a race with a concurrent writer. Safe to retry.
    #[error("Concurrent update, please retry: {0}")]
    Conflict(String),

    /// The inventory row (or its item) has no usable price.
    #[error("Invalid price for inventory {inventory_id}")]
    InvalidPrice { inventory_id: String },

    /// Checkout of an order that is already finalized.
    #[error("Order {order_id} is not in cart")]
    OrderNotInCart { order_id: String },

    #[error("Shop {shop_id} must be {expected}")]
    WrongShopKind { shop_id: String, expected: LocationKind },

    /// Inventory offered to a POS cart belongs to another shop.
    #[error("Inventory {inventory_id} does not belong to shop {shop_id}")]
    ShopMismatch { inventory_id: String, shop_id: String },

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

/// Machine-readable error kinds for the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// 400
    ValidationError,
    /// 409, with the offending lines
    StockShortfall,
    /// 404
    NotFound,
    /// 403
    Unauthorized,
    /// 409, retry
    Conflict,
    /// 422
    InvalidPrice,
    /// 409
    OrderNotInCart,
    /// 422
    WrongShopKind,
    /// 500
    Internal,
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn unauthorized(actor: impl Into<String>, action: impl Into<String>) -> Self {
        EngineError::Unauthorized {
            actor: actor.into(),
            action: action.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::ValidationError,
            EngineError::Domain(CoreError::InsufficientStock { .. }) => ErrorKind::StockShortfall,
            EngineError::Domain(_) => ErrorKind::ValidationError,
            EngineError::StockShortfall { .. } => ErrorKind::StockShortfall,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Unauthorized { .. } => ErrorKind::Unauthorized,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::InvalidPrice { .. } => ErrorKind::InvalidPrice,
            EngineError::OrderNotInCart { .. } => ErrorKind::OrderNotInCart,
            EngineError::WrongShopKind { .. } | EngineError::ShopMismatch { .. } => {
                ErrorKind::WrongShopKind
            }
            EngineError::Identity(_)
            | EngineError::Session(_)
            | EngineError::Config(_)
            | EngineError::Database(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

/// Not-found and lost races keep their meaning; the rest is a storage fault.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::Conflict(msg) => EngineError::Conflict(msg),
            DbError::PoolExhausted => EngineError::Conflict("connection pool exhausted".to_string()),
            DbError::QueryFailed(ref msg) | DbError::Internal(ref msg) => {
                tracing::error!(error = %msg, "Database operation failed");
                EngineError::Database(err)
            }
            other => EngineError::Database(other),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
