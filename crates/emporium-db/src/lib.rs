//! # emporium-db: Database Layer for Emporium
//!
//! SQLite storage for shops, catalog, inventory, customers, orders and
//! session values, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Data Flow                               │
//! │                                                                         │
//! │  emporium-engine (carts, checkout, restock, reports)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   emporium-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ shop, item    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ inventory     │    │ 001_initial  │  │   │
//! │  │   │ begin() → tx  │    │ customer      │    │              │  │   │
//! │  │   │               │    │ order, session│    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Per-table queries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emporium_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("emporium.db")).await?;
//! let online = db.shops().online_shop().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

/// The connection type every repository function takes, so callers can
/// name it without depending on sqlx.
pub use sqlx::SqliteConnection;

pub use repository::customer::CustomerRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::item::ItemRepository;
pub use repository::order::OrderRepository;
pub use repository::session::SessionRepository;
pub use repository::shop::ShopRepository;
