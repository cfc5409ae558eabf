//! # Item Repository
//!
//! Catalog items and their categories.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporium_core::Item;

const ITEM_COLUMNS: &str = "id, name, buy_price_cents, production_date, description, created_at";

// =============================================================================
// Connection-level queries
// =============================================================================

/// Inserts an item and its categories.
pub async fn insert_item(conn: &mut SqliteConnection, item: &Item) -> DbResult<()> {
    debug!(id = %item.id, name = %item.name, "Inserting item");

    sqlx::query(
        r#"
        INSERT INTO items (
            id, name, buy_price_cents, production_date, description, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&item.id)
    .bind(&item.name)
    .bind(item.buy_price_cents)
    .bind(item.production_date)
    .bind(&item.description)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    for category in &item.categories {
        sqlx::query("INSERT OR IGNORE INTO item_categories (item_id, category) VALUES (?1, ?2)")
            .bind(&item.id)
            .bind(category)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn load_categories(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Vec<String>> {
    let categories: Vec<String> =
        sqlx::query_scalar("SELECT category FROM item_categories WHERE item_id = ?1 ORDER BY category")
            .bind(item_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(categories)
}

pub async fn get_item(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match item {
        Some(mut item) => {
            item.categories = load_categories(conn, &item.id).await?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

pub async fn list_items(conn: &mut SqliteConnection) -> DbResult<Vec<Item>> {
    let mut items = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY name, id"))
        .fetch_all(&mut *conn)
        .await?;

    for item in &mut items {
        item.categories = load_categories(conn, &item.id).await?;
    }

    Ok(items)
}

/// Changes the price of record. Past order lines keep their snapshot.
pub async fn update_buy_price(conn: &mut SqliteConnection, id: &str, buy_price_cents: i64) -> DbResult<()> {
    let result = sqlx::query("UPDATE items SET buy_price_cents = ?2 WHERE id = ?1")
        .bind(id)
        .bind(buy_price_cents)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Item", id));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog items.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Inserts the item and its categories atomically.
    pub async fn insert(&self, item: &Item) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_item(&mut *tx, item).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        get_item(&mut *conn, id).await
    }

    pub async fn list(&self) -> DbResult<Vec<Item>> {
        let mut conn = self.pool.acquire().await?;
        list_items(&mut *conn).await
    }

    pub async fn update_buy_price(&self, id: &str, buy_price_cents: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_buy_price(&mut *conn, id, buy_price_cents).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
