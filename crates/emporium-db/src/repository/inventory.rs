//! # Inventory Repository
//!
//! Stock rows, one per (shop, item).
//!
//! ## Stock Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  checkout ─────► decrement_stock(id, n)                                │
//! │                  UPDATE .. SET quantity = quantity - n                  │
//! │                  WHERE id = ? AND quantity >= n                         │
//! │                  0 rows → Conflict (someone else took the stock)        │
//! │                                                                         │
//! │  restock ──────► decrement_stock(online_inv, n)                        │
//! │             └──► increment_stock(shop_inv, n) or insert_inventory      │
//! │                                                                         │
//! │  admin ────────► set_quantity / set_sell_price                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `CHECK (quantity >= 0)` column constraint backs the guard.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporium_core::{Inventory, PricedInventory};

const INVENTORY_COLUMNS: &str = "id, shop_id, item_id, quantity, sell_price_cents, created_at, updated_at";

const PRICED_SELECT: &str = r#"
    SELECT
        inv.id,
        inv.shop_id,
        inv.item_id,
        inv.quantity,
        inv.sell_price_cents,
        s.location_kind,
        i.name AS item_name,
        i.buy_price_cents
    FROM inventory inv
    JOIN shops s ON s.id = inv.shop_id
    LEFT JOIN items i ON i.id = inv.item_id
"#;

// =============================================================================
// Connection-level queries
// =============================================================================

pub async fn insert_inventory(conn: &mut SqliteConnection, inventory: &Inventory) -> DbResult<()> {
    debug!(
        id = %inventory.id,
        shop_id = %inventory.shop_id,
        item_id = %inventory.item_id,
        quantity = inventory.quantity,
        "Inserting inventory"
    );

    sqlx::query(
        r#"
        INSERT INTO inventory (
            id, shop_id, item_id, quantity, sell_price_cents, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&inventory.id)
    .bind(&inventory.shop_id)
    .bind(&inventory.item_id)
    .bind(inventory.quantity)
    .bind(inventory.sell_price_cents)
    .bind(inventory.created_at)
    .bind(inventory.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_inventory(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Inventory>> {
    let inventory =
        sqlx::query_as::<_, Inventory>(&format!("SELECT {INVENTORY_COLUMNS} FROM inventory WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(inventory)
}

/// The row for `item_id` at `shop_id`, if the shop stocks it.
pub async fn find_by_shop_and_item(
    conn: &mut SqliteConnection,
    shop_id: &str,
    item_id: &str,
) -> DbResult<Option<Inventory>> {
    let inventory = sqlx::query_as::<_, Inventory>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE shop_id = ?1 AND item_id = ?2"
    ))
    .bind(shop_id)
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(inventory)
}

/// An inventory row with its shop kind, item name and buy price.
pub async fn get_priced(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<PricedInventory>> {
    let priced = sqlx::query_as::<_, PricedInventory>(&format!("{PRICED_SELECT} WHERE inv.id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(priced)
}

pub async fn list_for_shop(conn: &mut SqliteConnection, shop_id: &str) -> DbResult<Vec<PricedInventory>> {
    let rows = sqlx::query_as::<_, PricedInventory>(&format!(
        "{PRICED_SELECT} WHERE inv.shop_id = ?1 ORDER BY item_name, inv.id"
    ))
    .bind(shop_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Takes `quantity` units off a row, only if that many are on hand.
///
/// ## Errors
/// * `Conflict` - fewer than `quantity` units remain (or the row is gone)
pub async fn decrement_stock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    debug!(id = %id, quantity, "Decrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE inventory SET
            quantity = quantity - ?2,
            updated_at = ?3
        WHERE id = ?1 AND quantity >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "inventory {id} no longer has {quantity} units"
        )));
    }

    Ok(())
}

pub async fn increment_stock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    debug!(id = %id, quantity, "Incrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE inventory SET
            quantity = quantity + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Inventory", id));
    }

    Ok(())
}

/// Sets the absolute stock level.
pub async fn set_quantity(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    let result = sqlx::query("UPDATE inventory SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Inventory", id));
    }

    Ok(())
}

pub async fn set_sell_price(conn: &mut SqliteConnection, id: &str, sell_price_cents: i64) -> DbResult<()> {
    let result = sqlx::query("UPDATE inventory SET sell_price_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(sell_price_cents)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Inventory", id));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for inventory rows.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    pub async fn insert(&self, inventory: &Inventory) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_inventory(&mut *conn, inventory).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Inventory>> {
        let mut conn = self.pool.acquire().await?;
        get_inventory(&mut *conn, id).await
    }

    pub async fn find_by_shop_and_item(&self, shop_id: &str, item_id: &str) -> DbResult<Option<Inventory>> {
        let mut conn = self.pool.acquire().await?;
        find_by_shop_and_item(&mut *conn, shop_id, item_id).await
    }

    pub async fn get_priced(&self, id: &str) -> DbResult<Option<PricedInventory>> {
        let mut conn = self.pool.acquire().await?;
        get_priced(&mut *conn, id).await
    }

    pub async fn list_for_shop(&self, shop_id: &str) -> DbResult<Vec<PricedInventory>> {
        let mut conn = self.pool.acquire().await?;
        list_for_shop(&mut *conn, shop_id).await
    }

    pub async fn set_quantity(&self, id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_quantity(&mut *conn, id, quantity).await
    }

    pub async fn set_sell_price(&self, id: &str, sell_price_cents: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_sell_price(&mut *conn, id, sell_price_cents).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
