//! # Order Repository
//!
//! Orders, order lines and the sales queries built on them.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. OPEN CART (web)                                                    │
//! │     └── find_cart() or insert_order() → Order { status: InCart }       │
//! │                                                                         │
//! │  2. EDIT LINES                                                         │
//! │     └── insert_order_item / set_order_item_quantity / delete_order_item│
//! │         (all guarded: the parent must still be InCart)                 │
//! │                                                                         │
//! │  3. CHECKOUT                                                           │
//! │     └── stamp_order_item() → prices + discount frozen                  │
//! │     └── finalize_order()   → Order { status: Ordered, order_date }     │
//! │                                                                         │
//! │  POS sales skip 1-2: the order is inserted already Ordered.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporium_core::{Order, OrderItem, OrderLineView};

const ORDER_COLUMNS: &str = "id, customer_id, shop_id, status, order_date, created_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, inventory_id, quantity, unit_price_cents, \
     unit_buy_price_cents, discount_bps, created_at";

/// Restricts an `order_items` write to lines whose order is still a cart.
const OPEN_CART_GUARD: &str = "order_id IN (SELECT id FROM orders WHERE status = 'in_cart')";

// =============================================================================
// Orders
// =============================================================================

pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, customer_id = %order.customer_id, shop_id = %order.shop_id, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (id, customer_id, shop_id, status, order_date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(&order.shop_id)
    .bind(order.status)
    .bind(order.order_date)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

/// The open cart of `customer_id` at `shop_id`, if any.
pub async fn find_cart(
    conn: &mut SqliteConnection,
    customer_id: &str,
    shop_id: &str,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE customer_id = ?1 AND shop_id = ?2 AND status = 'in_cart'"
    ))
    .bind(customer_id)
    .bind(shop_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Moves a cart to `Ordered`.
///
/// ## Errors
/// * `Conflict` - the order is not (or no longer) `InCart`
pub async fn finalize_order(
    conn: &mut SqliteConnection,
    id: &str,
    order_date: DateTime<Utc>,
) -> DbResult<()> {
    debug!(id = %id, "Finalizing order");

    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = 'ordered',
            order_date = ?2
        WHERE id = ?1 AND status = 'in_cart'
        "#,
    )
    .bind(id)
    .bind(order_date)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!("order {id} is no longer in cart")));
    }

    Ok(())
}

/// The `limit` most recent finalized orders of a customer, newest first.
pub async fn recent_orders(
    conn: &mut SqliteConnection,
    customer_id: &str,
    limit: i64,
) -> DbResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE customer_id = ?1 AND status = 'ordered' \
         ORDER BY order_date DESC, rowid DESC \
         LIMIT ?2"
    ))
    .bind(customer_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(orders)
}

// =============================================================================
// Order Items
// =============================================================================

pub async fn insert_order_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    debug!(
        order_id = %item.order_id,
        inventory_id = %item.inventory_id,
        quantity = item.quantity,
        "Inserting order item"
    );

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, inventory_id, quantity,
            unit_price_cents, unit_buy_price_cents, discount_bps, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.inventory_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.unit_buy_price_cents)
    .bind(item.discount_bps)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_order_item(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<OrderItem>> {
    let item = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

/// The line for `inventory_id` in `order_id`, if present.
pub async fn find_order_item(
    conn: &mut SqliteConnection,
    order_id: &str,
    inventory_id: &str,
) -> DbResult<Option<OrderItem>> {
    let item = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 AND inventory_id = ?2"
    ))
    .bind(order_id)
    .bind(inventory_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

pub async fn list_order_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY created_at, id"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Order lines joined with current stock and prices.
pub async fn list_line_views(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLineView>> {
    let lines = sqlx::query_as::<_, OrderLineView>(
        r#"
        SELECT
            oi.id AS order_item_id,
            oi.order_id,
            oi.inventory_id,
            oi.quantity,
            oi.unit_price_cents,
            oi.unit_buy_price_cents,
            oi.discount_bps,
            inv.shop_id,
            inv.item_id,
            i.name AS item_name,
            inv.quantity AS stock_quantity,
            inv.sell_price_cents AS current_sell_price_cents,
            i.buy_price_cents AS current_buy_price_cents
        FROM order_items oi
        JOIN inventory inv ON inv.id = oi.inventory_id
        LEFT JOIN items i ON i.id = inv.item_id
        WHERE oi.order_id = ?1
        ORDER BY oi.created_at, oi.id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Sets a cart line's quantity.
///
/// ## Errors
/// * `NotFound` - no such line, or its order is already finalized
pub async fn set_order_item_quantity(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    let result = sqlx::query(&format!(
        "UPDATE order_items SET quantity = ?2 WHERE id = ?1 AND {OPEN_CART_GUARD}"
    ))
    .bind(id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order item (in cart)", id));
    }

    Ok(())
}

/// Removes a cart line. Finalized lines are never deleted.
pub async fn delete_order_item(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let result = sqlx::query(&format!("DELETE FROM order_items WHERE id = ?1 AND {OPEN_CART_GUARD}"))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order item (in cart)", id));
    }

    Ok(())
}

/// Writes the checkout snapshot onto a cart line.
pub async fn stamp_order_item(
    conn: &mut SqliteConnection,
    id: &str,
    unit_price_cents: i64,
    unit_buy_price_cents: i64,
    discount_bps: i64,
) -> DbResult<()> {
    let result = sqlx::query(&format!(
        "UPDATE order_items SET \
             unit_price_cents = ?2, \
             unit_buy_price_cents = ?3, \
             discount_bps = ?4 \
         WHERE id = ?1 AND {OPEN_CART_GUARD}"
    ))
    .bind(id)
    .bind(unit_price_cents)
    .bind(unit_buy_price_cents)
    .bind(discount_bps)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!("order item {id} is no longer in an open cart")));
    }

    Ok(())
}

// =============================================================================
// Sales
// =============================================================================

/// Every finalized line sold from one inventory row.
pub async fn sold_lines_for_inventory(
    conn: &mut SqliteConnection,
    inventory_id: &str,
) -> DbResult<Vec<OrderItem>> {
    let lines = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT
            oi.id, oi.order_id, oi.inventory_id, oi.quantity,
            oi.unit_price_cents, oi.unit_buy_price_cents, oi.discount_bps, oi.created_at
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE oi.inventory_id = ?1 AND o.status = 'ordered'
        ORDER BY o.order_date, oi.id
        "#,
    )
    .bind(inventory_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Every finalized line sold from any inventory row of one shop.
pub async fn sold_lines_for_shop(conn: &mut SqliteConnection, shop_id: &str) -> DbResult<Vec<OrderItem>> {
    let lines = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT
            oi.id, oi.order_id, oi.inventory_id, oi.quantity,
            oi.unit_price_cents, oi.unit_buy_price_cents, oi.discount_bps, oi.created_at
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN inventory inv ON inv.id = oi.inventory_id
        WHERE inv.shop_id = ?1 AND o.status = 'ordered'
        ORDER BY oi.inventory_id, o.order_date, oi.id
        "#,
    )
    .bind(shop_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders and order lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        get_order(&mut *conn, id).await
    }

    pub async fn find_cart(&self, customer_id: &str, shop_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        find_cart(&mut *conn, customer_id, shop_id).await
    }

    pub async fn get_item(&self, id: &str) -> DbResult<Option<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        get_order_item(&mut *conn, id).await
    }

    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        list_order_items(&mut *conn, order_id).await
    }

    pub async fn line_views(&self, order_id: &str) -> DbResult<Vec<OrderLineView>> {
        let mut conn = self.pool.acquire().await?;
        list_line_views(&mut *conn, order_id).await
    }

    pub async fn recent_orders(&self, customer_id: &str, limit: i64) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        recent_orders(&mut *conn, customer_id, limit).await
    }

    pub async fn sold_lines_for_inventory(&self, inventory_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        sold_lines_for_inventory(&mut *conn, inventory_id).await
    }

    pub async fn sold_lines_for_shop(&self, shop_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        sold_lines_for_shop(&mut *conn, shop_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use emporium_core::{Inventory, LocationKind, OrderStatus};
    use uuid::Uuid;

    struct World {
        db: Database,
        inv: Inventory,
        order: Order,
    }

    async fn world() -> World {
        let db = fixtures::db().await;
        let shop = fixtures::shop("Web", LocationKind::Online);
        let item = fixtures::item("Lamp", 2000);
        let customer = fixtures::customer(Some("user-1"));
        let inv = fixtures::inventory(&shop, &item, 10, 3500);
        let order = fixtures::cart(&customer, &shop);

        db.shops().insert(&shop).await.unwrap();
        db.items().insert(&item).await.unwrap();
        db.inventory().insert(&inv).await.unwrap();
        db.customers().insert(&customer).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        insert_order(&mut *conn, &order).await.unwrap();
        drop(conn);

        World { db, inv, order }
    }

    fn line(order: &Order, inv: &Inventory, quantity: i64) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            inventory_id: inv.id.clone(),
            quantity,
            unit_price_cents: inv.sell_price_cents,
            unit_buy_price_cents: 2000,
            discount_bps: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_single_open_cart_per_customer_and_shop() {
        let w = world().await;
        let mut conn = w.db.pool().acquire().await.unwrap();

        let mut second = w.order.clone();
        second.id = Uuid::new_v4().to_string();
        let err = insert_order(&mut *conn, &second).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let found = find_cart(&mut *conn, &w.order.customer_id, &w.order.shop_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, w.order.id);
    }

    #[tokio::test]
    async fn test_finalize_only_once() {
        let w = world().await;
        let mut conn = w.db.pool().acquire().await.unwrap();

        finalize_order(&mut *conn, &w.order.id, Utc::now()).await.unwrap();
        let err = finalize_order(&mut *conn, &w.order.id, Utc::now()).await.unwrap_err();
        assert!(err.is_conflict());

        let order = get_order(&mut *conn, &w.order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Ordered);
        assert!(order.order_date.is_some());
    }

    #[tokio::test]
    async fn test_finalized_lines_are_frozen() {
        let w = world().await;
        let mut conn = w.db.pool().acquire().await.unwrap();
        let item = line(&w.order, &w.inv, 2);
        insert_order_item(&mut *conn, &item).await.unwrap();

        set_order_item_quantity(&mut *conn, &item.id, 3).await.unwrap();
        finalize_order(&mut *conn, &w.order.id, Utc::now()).await.unwrap();

        assert!(set_order_item_quantity(&mut *conn, &item.id, 5).await.is_err());
        assert!(delete_order_item(&mut *conn, &item.id).await.is_err());
        assert!(stamp_order_item(&mut *conn, &item.id, 1, 1, 0).await.is_err());

        let stored = get_order_item(&mut *conn, &item.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 3);
    }

    #[tokio::test]
    async fn test_line_views_join_current_stock() {
        let w = world().await;
        let mut conn = w.db.pool().acquire().await.unwrap();
        insert_order_item(&mut *conn, &line(&w.order, &w.inv, 4)).await.unwrap();

        let views = list_line_views(&mut *conn, &w.order.id).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].stock_quantity, 10);
        assert_eq!(views[0].current_sell_price_cents, 3500);
        assert_eq!(views[0].current_buy_price_cents, Some(2000));
        assert_eq!(views[0].item_name.as_deref(), Some("Lamp"));
    }

    #[tokio::test]
    async fn test_sold_lines_skip_open_carts() {
        let w = world().await;
        let mut conn = w.db.pool().acquire().await.unwrap();
        insert_order_item(&mut *conn, &line(&w.order, &w.inv, 2)).await.unwrap();

        assert!(sold_lines_for_inventory(&mut *conn, &w.inv.id).await.unwrap().is_empty());

        finalize_order(&mut *conn, &w.order.id, Utc::now()).await.unwrap();
        assert_eq!(sold_lines_for_inventory(&mut *conn, &w.inv.id).await.unwrap().len(), 1);
        assert_eq!(sold_lines_for_shop(&mut *conn, &w.inv.shop_id).await.unwrap().len(), 1);
        assert_eq!(
            recent_orders(&mut *conn, &w.order.customer_id, 3).await.unwrap().len(),
            1
        );
    }
}
