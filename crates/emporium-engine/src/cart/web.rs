//! # Web Cart
//!
//! A customer's cart at the Online shop, persisted as their `InCart`
//! order and its lines.
//!
//! ## Add Flow
//! ```text
//! add_or_increment(inventory, n)          one transaction
//!   │
//!   ├── inventory row?            no  → NotFound
//!   ├── at the Online shop?       no  → WrongShopKind
//!   ├── both prices usable?       no  → InvalidPrice
//!   ├── any stock on hand?        no  → StockShortfall
//!   │
//!   ├── InCart order for (customer, Online)   created on first add
//!   └── line for inventory?
//!         yes → quantity = min(line + n, stock)
//!         no  → new line, quantity = min(n, stock), prices copied
//! ```
//!
//! Lines keep the prices seen when they were added; checkout restamps them.

use async_trait::async_trait;
use emporium_core::validation::{validate_cart_size, validate_new_quantity, validate_quantity};
use emporium_core::{
    CartLine, CoreError, Customer, LocationKind, Order, OrderItem, OrderLineView, OrderStatus, MAX_ITEM_QUANTITY,
};
use emporium_db::repository::{inventory, order, shop};
use emporium_db::{DbError, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use super::{AddOutcome, CartStore};
use crate::error::{EngineError, EngineResult, Shortfall};
use crate::EngineContext;

#[derive(Debug, Clone)]
pub struct WebCart {
    ctx: EngineContext,
    customer: Customer,
}

impl WebCart {
    pub fn new(ctx: EngineContext, customer: Customer) -> Self {
        WebCart { ctx, customer }
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    /// The customer's open order at the Online shop, if any.
    pub async fn cart_order(&self) -> EngineResult<Option<Order>> {
        let mut conn = self.ctx.db.acquire().await?;
        open_cart(&mut *conn, &self.customer.id).await
    }

    /// Lines of any order, joined with current stock and prices.
    pub async fn line_items(&self, order_id: &str) -> EngineResult<Vec<OrderLineView>> {
        Ok(self.ctx.db.orders().line_views(order_id).await?)
    }

    /// Sets the quantity of one order line; 0 removes it.
    ///
    /// Not clamped to stock; checkout reports any shortfall.
    pub async fn change_order_item_quantity(&self, order_item_id: &str, quantity: i64) -> EngineResult<()> {
        validate_new_quantity(quantity)?;

        let mut tx = self.ctx.db.begin().await?;
        self.own_line(&mut *tx, order_item_id).await?;
        if quantity == 0 {
            order::delete_order_item(&mut *tx, order_item_id).await?;
        } else {
            order::set_order_item_quantity(&mut *tx, order_item_id, quantity).await?;
        }
        tx.commit().await.map_err(DbError::from)?;

        debug!(order_item_id = %order_item_id, quantity, "Cart line quantity changed");
        Ok(())
    }

    pub async fn remove_order_item(&self, order_item_id: &str) -> EngineResult<()> {
        let mut tx = self.ctx.db.begin().await?;
        self.own_line(&mut *tx, order_item_id).await?;
        order::delete_order_item(&mut *tx, order_item_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        debug!(order_item_id = %order_item_id, "Cart line removed");
        Ok(())
    }

    /// Loads a line and checks it sits in this customer's open cart.
    async fn own_line(&self, conn: &mut SqliteConnection, order_item_id: &str) -> EngineResult<OrderItem> {
        let line = order::get_order_item(conn, order_item_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order item", order_item_id))?;
        let parent = order::get_order(conn, &line.order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", &line.order_id))?;

        if parent.customer_id != self.customer.id {
            return Err(EngineError::not_found("Order item", order_item_id));
        }
        if !parent.is_in_cart() {
            return Err(EngineError::OrderNotInCart { order_id: parent.id });
        }
        Ok(line)
    }

    /// The line for `inventory_id` in the open cart.
    async fn line_for(&self, conn: &mut SqliteConnection, inventory_id: &str) -> EngineResult<OrderItem> {
        let cart = open_cart(conn, &self.customer.id)
            .await?
            .ok_or_else(|| CoreError::LineNotInCart(inventory_id.to_string()))?;
        let line = order::find_order_item(conn, &cart.id, inventory_id)
            .await?
            .ok_or_else(|| CoreError::LineNotInCart(inventory_id.to_string()))?;
        Ok(line)
    }

    /// The open cart, created if the customer has none.
    async fn ensure_cart(&self, conn: &mut SqliteConnection, online_shop_id: &str) -> EngineResult<Order> {
        if let Some(existing) = order::find_cart(conn, &self.customer.id, online_shop_id).await? {
            return Ok(existing);
        }

        let cart = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: self.customer.id.clone(),
            shop_id: online_shop_id.to_string(),
            status: OrderStatus::InCart,
            order_date: None,
            created_at: self.ctx.now(),
        };
        match order::insert_order(conn, &cart).await {
            Ok(()) => {
                debug!(order_id = %cart.id, customer_id = %self.customer.id, "Cart opened");
                Ok(cart)
            }
            // Another request opened it first
            Err(DbError::UniqueViolation { .. }) => order::find_cart(conn, &self.customer.id, online_shop_id)
                .await?
                .ok_or_else(|| EngineError::Conflict(format!("cart for customer {}", self.customer.id))),
            Err(e) => Err(e.into()),
        }
    }
}

/// The open cart of a customer at the Online shop.
async fn open_cart(conn: &mut SqliteConnection, customer_id: &str) -> EngineResult<Option<Order>> {
    let Some(online) = shop::find_online_shop(conn).await? else {
        return Ok(None);
    };
    Ok(order::find_cart(conn, customer_id, &online.id).await?)
}

#[async_trait]
impl CartStore for WebCart {
    async fn add_or_increment(&self, inventory_id: &str, quantity: i64) -> EngineResult<AddOutcome> {
        validate_quantity(quantity)?;

        let mut tx = self.ctx.db.begin().await?;

        let row = inventory::get_priced(&mut *tx, inventory_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Inventory", inventory_id))?;
        if row.location_kind != LocationKind::Online {
            return Err(EngineError::WrongShopKind {
                shop_id: row.shop_id,
                expected: LocationKind::Online,
            });
        }
        let (sell, buy) = row.prices().ok_or_else(|| EngineError::InvalidPrice {
            inventory_id: row.id.clone(),
        })?;
        if row.quantity <= 0 {
            return Err(EngineError::StockShortfall {
                lines: vec![Shortfall {
                    inventory_id: row.id.clone(),
                    item_name: row.display_name().to_string(),
                    requested: quantity,
                    available: 0,
                }],
            });
        }

        let cart = self.ensure_cart(&mut *tx, &row.shop_id).await?;
        let limit = row.quantity.min(MAX_ITEM_QUANTITY);

        let (wanted, stored) = match order::find_order_item(&mut *tx, &cart.id, &row.id).await? {
            Some(existing) => {
                let wanted = existing.quantity + quantity;
                let stored = wanted.min(limit);
                order::set_order_item_quantity(&mut *tx, &existing.id, stored).await?;
                (wanted, stored)
            }
            None => {
                let lines = order::list_order_items(&mut *tx, &cart.id).await?;
                validate_cart_size(lines.len())?;

                let stored = quantity.min(limit);
                let line = OrderItem {
                    id: Uuid::new_v4().to_string(),
                    order_id: cart.id.clone(),
                    inventory_id: row.id.clone(),
                    quantity: stored,
                    unit_price_cents: sell,
                    unit_buy_price_cents: buy,
                    discount_bps: 0,
                    created_at: self.ctx.now(),
                };
                order::insert_order_item(&mut *tx, &line).await?;
                (quantity, stored)
            }
        };

        tx.commit().await.map_err(DbError::from)?;

        let clamped = stored < wanted;
        info!(
            order_id = %cart.id,
            inventory_id = %row.id,
            quantity = stored,
            clamped,
            "Added to web cart"
        );

        Ok(AddOutcome {
            inventory_id: row.id,
            quantity: stored,
            clamped,
        })
    }

    async fn change_quantity(&self, inventory_id: &str, quantity: i64) -> EngineResult<()> {
        let line = {
            let mut conn = self.ctx.db.acquire().await?;
            self.line_for(&mut *conn, inventory_id).await?
        };
        self.change_order_item_quantity(&line.id, quantity).await
    }

    async fn remove(&self, inventory_id: &str) -> EngineResult<()> {
        let line = {
            let mut conn = self.ctx.db.acquire().await?;
            self.line_for(&mut *conn, inventory_id).await?
        };
        self.remove_order_item(&line.id).await
    }

    async fn decrement_one(&self, inventory_id: &str) -> EngineResult<i64> {
        let mut tx = self.ctx.db.begin().await?;
        let line = self.line_for(&mut *tx, inventory_id).await?;

        let remaining = (line.quantity - 1).max(0);
        if remaining == 0 {
            order::delete_order_item(&mut *tx, &line.id).await?;
        } else {
            order::set_order_item_quantity(&mut *tx, &line.id, remaining).await?;
        }
        tx.commit().await.map_err(DbError::from)?;

        Ok(remaining)
    }

    async fn lines(&self) -> EngineResult<Vec<CartLine>> {
        let mut conn = self.ctx.db.acquire().await?;
        let Some(cart) = open_cart(&mut *conn, &self.customer.id).await? else {
            return Ok(Vec::new());
        };

        let items = order::list_order_items(&mut *conn, &cart.id).await?;
        Ok(items
            .into_iter()
            .map(|i| CartLine {
                inventory_id: i.inventory_id,
                quantity: i.quantity,
                unit_price: i.unit_price_cents,
                unit_buy_price: i.unit_buy_price_cents,
                discount_bps: i.discount_bps,
            })
            .collect())
    }

    async fn clear(&self) -> EngineResult<()> {
        let mut tx = self.ctx.db.begin().await?;
        if let Some(cart) = open_cart(&mut *tx, &self.customer.id).await? {
            for line in order::list_order_items(&mut *tx, &cart.id).await? {
                order::delete_order_item(&mut *tx, &line.id).await?;
            }
            debug!(order_id = %cart.id, "Cart cleared");
        }
        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use crate::testing::harness;

    #[tokio::test]
    async fn test_add_clamps_to_stock() {
        let h = harness().await;
        let widget = h.stock(&h.online, "Widget", 10, 500, 200).await;
        let customer = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let cart = h.engine.web_cart(customer);

        let outcome = cart.add_or_increment(&widget.id, 12).await.unwrap();
        assert_eq!(outcome.quantity, 10);
        assert!(outcome.clamped);

        let lines = cart.lines().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 10);
        assert_eq!(lines[0].unit_price, 500);
        assert_eq!(lines[0].unit_buy_price, 200);
    }

    #[tokio::test]
    async fn test_add_twice_merges_lines() {
        let h = harness().await;
        let widget = h.stock(&h.online, "Widget", 10, 500, 200).await;
        let customer = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let cart = h.engine.web_cart(customer);

        cart.add_or_increment(&widget.id, 3).await.unwrap();
        let outcome = cart.add_or_increment(&widget.id, 4).await.unwrap();
        assert_eq!(outcome.quantity, 7);
        assert!(!outcome.clamped);

        let outcome = cart.add_or_increment(&widget.id, 4).await.unwrap();
        assert_eq!(outcome.quantity, 10);
        assert!(outcome.clamped);

        assert_eq!(cart.lines().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejections_leave_cart_empty() {
        let h = harness().await;
        let sold_out = h.stock(&h.online, "Gadget", 0, 500, 200).await;
        let in_store = h.stock(&h.physical, "Gizmo", 5, 500, 200).await;
        let customer = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let cart = h.engine.web_cart(customer);

        let err = cart.add_or_increment("missing", 1).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let err = cart.add_or_increment(&sold_out.id, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::StockShortfall { .. }));

        let err = cart.add_or_increment(&in_store.id, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::WrongShopKind { .. }));

        let err = cart.add_or_increment(&sold_out.id, 0).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        assert!(cart.lines().await.unwrap().is_empty());
        assert!(cart.cart_order().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_open_cart_per_customer() {
        let h = harness().await;
        let a = h.stock(&h.online, "Widget", 10, 500, 200).await;
        let b = h.stock(&h.online, "Gadget", 10, 700, 300).await;
        let customer = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let cart = h.engine.web_cart(customer);

        cart.add_or_increment(&a.id, 1).await.unwrap();
        let first = cart.cart_order().await.unwrap().unwrap();
        cart.add_or_increment(&b.id, 1).await.unwrap();
        let second = cart.cart_order().await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(cart.line_items(&first.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_change_decrement_remove_and_clear() {
        let h = harness().await;
        let a = h.stock(&h.online, "Widget", 10, 500, 200).await;
        let b = h.stock(&h.online, "Gadget", 10, 700, 300).await;
        let customer = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let cart = h.engine.web_cart(customer);

        cart.add_or_increment(&a.id, 2).await.unwrap();
        cart.add_or_increment(&b.id, 1).await.unwrap();

        cart.change_quantity(&a.id, 5).await.unwrap();
        assert_eq!(cart.decrement_one(&a.id).await.unwrap(), 4);
        assert_eq!(cart.decrement_one(&b.id).await.unwrap(), 0);
        assert_eq!(cart.lines().await.unwrap().len(), 1);

        let err = cart.change_quantity(&a.id, 1000).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = cart.remove(&b.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::LineNotInCart(_))));

        let totals = cart.totals(emporium_core::DiscountRate::zero()).await.unwrap();
        assert_eq!(totals.subtotal_cents, 2000);

        cart.clear().await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_touch_someone_elses_line() {
        let h = harness().await;
        let a = h.stock(&h.online, "Widget", 10, 500, 200).await;
        let alice = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let bob = h.engine.customers().guest(&MemorySession::new()).await.unwrap();

        let alice_cart = h.engine.web_cart(alice);
        alice_cart.add_or_increment(&a.id, 1).await.unwrap();
        let order = alice_cart.cart_order().await.unwrap().unwrap();
        let line_id = alice_cart.line_items(&order.id).await.unwrap()[0].order_item_id.clone();

        let err = h.engine.web_cart(bob).remove_order_item(&line_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
