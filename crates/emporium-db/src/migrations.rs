//! # Schema Migrations
//!
//! The SQL under `migrations/sqlite` is compiled into the binary and applied
//! by [`Database::new`](crate::Database::new) unless the config opts out.
//!
//! ```text
//! 001_initial_schema.sql
//!   shops            one online shop (partial unique index)
//!   items            + item_categories
//!   inventory        UNIQUE (shop_id, item_id), CHECK (quantity >= 0)
//!   customers        UNIQUE user_id
//!   orders           one in_cart order per (customer, shop)
//!   order_items      prices and discount frozen at checkout
//!   session_values   POS carts and guest ids, with expiry
//! ```
//!
//! Schema changes go in a new `NNN_description.sql`; applied files are
//! checksummed by sqlx and must never be edited.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever has not been applied yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    debug!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .unwrap_or(0);

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
