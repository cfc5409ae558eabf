//! # Checkout
//!
//! Turns a cart into an `Ordered` order, atomically.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout                                        │
//! │                                                                         │
//! │  web: checkout_order(order_id)      POS: checkout_pos(shop, session,   │
//! │       cart owner pays                      customer selection)          │
//! │            │                                   │                        │
//! │            └──────────────┬────────────────────┘                        │
//! │                           ▼                                             │
//! │  ┌──────────────── one transaction ─────────────────────────────────┐  │
//! │  │ 1. resolve paying customer                                       │  │
//! │  │ 2. every line ≤ stock on hand, else StockShortfall (all lines)   │  │
//! │  │ 3. rate = 0 for guests / unconfirmed, else tier rate            │  │
//! │  │ 4. finalize (web: InCart → Ordered; POS: insert Ordered order)   │  │
//! │  │    stamp lines: current sell price, current buy price, rate      │  │
//! │  │ 5. decrement stock                                                │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 ▼ commit                                │
//! │  6. award points = floor(total paid × 10)  (confirmed identities only) │
//! │  7. POS: drop the session cart                                         │
//! │  8. CheckoutReceipt                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A lost race (busy database, stock taken by a concurrent sale, order
//! finalized by a double submit) surfaces as `Conflict` and the whole
//! attempt is run once more. On the second run a double-submitted web
//! order is seen as `Ordered` and rejected with `OrderNotInCart`.

use chrono::{DateTime, Utc};
use emporium_core::{
    CartLine, Customer, DiscountRate, LocationKind, Money, Order, OrderItem, OrderStatus, PosCartContents,
    PricedInventory, ValidationError,
};
use emporium_db::repository::{customer as customer_repo, inventory, order, shop};
use emporium_db::DbError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::customer::{award_points, discount_rate_for, resolve_pos_customer};
use crate::error::{EngineError, EngineResult, Shortfall};
use crate::ledger;
use crate::session::{pos_cart_key, SessionStore};
use crate::EngineContext;

// =============================================================================
// Types
// =============================================================================

/// Who pays at the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PosCustomer {
    /// A fresh guest is created for the sale.
    Guest,
    /// An existing customer row.
    Customer(String),
    /// A registered user, resolved to their customer row.
    User(String),
}

/// One receipt line. Amounts in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub order_item_id: String,
    pub inventory_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_bps: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub paid_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub customer_id: String,
    pub shop_id: String,
    pub order_date: DateTime<Utc>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_bps: u32,
    pub points_awarded: i64,
}

impl CheckoutReceipt {
    fn build(
        order: &Order,
        order_date: DateTime<Utc>,
        items: &[(OrderItem, String)],
        rate: DiscountRate,
        points_awarded: i64,
    ) -> Self {
        let lines: Vec<ReceiptLine> = items
            .iter()
            .map(|(item, name)| {
                let subtotal = item.subtotal();
                let paid = item.paid();
                ReceiptLine {
                    order_item_id: item.id.clone(),
                    inventory_id: item.inventory_id.clone(),
                    item_name: name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    discount_bps: item.discount_bps,
                    subtotal_cents: subtotal.cents(),
                    discount_cents: (subtotal - paid).cents(),
                    paid_cents: paid.cents(),
                }
            })
            .collect();

        CheckoutReceipt {
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            shop_id: order.shop_id.clone(),
            order_date,
            subtotal_cents: lines.iter().map(|l| l.subtotal_cents).sum(),
            discount_cents: lines.iter().map(|l| l.discount_cents).sum(),
            total_cents: lines.iter().map(|l| l.paid_cents).sum(),
            lines,
            discount_bps: rate.bps(),
            points_awarded,
        }
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// What a committed checkout hands to the post-commit steps.
struct Finalized {
    order: Order,
    order_date: DateTime<Utc>,
    customer: Customer,
    rate: DiscountRate,
    items: Vec<(OrderItem, String)>,
}

// =============================================================================
// Line validation
// =============================================================================

/// A cart line with the inventory row it draws from.
struct PricedLine {
    quantity: i64,
    row: PricedInventory,
    /// Existing order line, web carts only.
    order_item_id: Option<String>,
}

/// Checks every line against stock and prices.
///
/// Reports all short lines at once; price problems are reported only when
/// stock is sufficient.
fn check_lines(lines: &[PricedLine]) -> EngineResult<()> {
    let short: Vec<Shortfall> = lines
        .iter()
        .filter_map(|l| ledger::shortfall(&l.row, l.quantity))
        .collect();
    if !short.is_empty() {
        return Err(EngineError::StockShortfall { lines: short });
    }

    if let Some(bad) = lines.iter().find(|l| l.row.prices().is_none()) {
        return Err(EngineError::InvalidPrice {
            inventory_id: bad.row.id.clone(),
        });
    }
    Ok(())
}

fn stamped(line: &PricedLine, order_id: &str, rate: DiscountRate, now: DateTime<Utc>) -> EngineResult<OrderItem> {
    let (sell, buy) = line.row.prices().ok_or_else(|| EngineError::InvalidPrice {
        inventory_id: line.row.id.clone(),
    })?;
    Ok(OrderItem {
        id: line
            .order_item_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        order_id: order_id.to_string(),
        inventory_id: line.row.id.clone(),
        quantity: line.quantity,
        unit_price_cents: sell,
        unit_buy_price_cents: buy,
        discount_bps: i64::from(rate.bps()),
        created_at: now,
    })
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Clone)]
pub struct Checkout {
    ctx: EngineContext,
}

impl Checkout {
    pub fn new(ctx: EngineContext) -> Self {
        Checkout { ctx }
    }

    fn retries(&self) -> u8 {
        self.ctx.config.checkout.conflict_retries
    }

    /// Finalizes a web cart. The cart's owner pays.
    ///
    /// ## Errors
    /// * `NotFound` - no such order
    /// * `OrderNotInCart` - already checked out
    /// * `StockShortfall` - lists every short line; nothing changes
    /// * `InvalidPrice` - a line has no usable price
    /// * `Conflict` - lost a race twice
    pub async fn checkout_order(&self, order_id: &str) -> EngineResult<CheckoutReceipt> {
        let finalized = ledger::retry_on_conflict(self.retries(), "checkout_order", || {
            self.finalize_web_order(order_id)
        })
        .await?;

        Ok(self.complete(finalized).await)
    }

    /// Rings up the POS cart of `shop_id` held in `session`.
    ///
    /// The session cart is dropped only after a successful commit.
    pub async fn checkout_pos(
        &self,
        shop_id: &str,
        session: &dyn SessionStore,
        selection: PosCustomer,
    ) -> EngineResult<CheckoutReceipt> {
        let key = pos_cart_key(shop_id);
        let raw = session.get(&key).await?;
        let contents = PosCartContents::from_session_bytes(raw.as_deref())?;
        if contents.is_empty() {
            return Err(ValidationError::Required {
                field: "cart items".to_string(),
            }
            .into());
        }

        let finalized = ledger::retry_on_conflict(self.retries(), "checkout_pos", || {
            self.finalize_pos_sale(shop_id, &contents.lines, &selection)
        })
        .await?;

        session.remove(&key).await?;
        Ok(self.complete(finalized).await)
    }

    /// Rebuilds the receipt of a finalized order.
    ///
    /// Points are what the order earns under the current schedule, and only
    /// for a buyer whose identity is confirmed; the balance is not touched.
    pub async fn receipt(&self, order_id: &str) -> EngineResult<CheckoutReceipt> {
        let mut conn = self.ctx.db.acquire().await?;

        let found = order::get_order(&mut *conn, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;
        let order_date = match found.order_date {
            Some(date) if !found.is_in_cart() => date,
            _ => return Err(EngineError::not_found("Finalized order", order_id)),
        };
        let buyer = customer_repo::get_customer(&mut *conn, &found.customer_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Customer", &found.customer_id))?;

        let views = order::list_line_views(&mut *conn, order_id).await?;
        let lines = order::list_order_items(&mut *conn, order_id).await?;
        let items: Vec<(OrderItem, String)> = lines
            .into_iter()
            .map(|item| {
                let name = views
                    .iter()
                    .find(|v| v.order_item_id == item.id)
                    .and_then(|v| v.item_name.clone())
                    .unwrap_or_else(|| item.inventory_id.clone());
                (item, name)
            })
            .collect();

        let rate = items
            .first()
            .map(|(i, _)| i.discount_rate())
            .unwrap_or_else(DiscountRate::zero);
        drop(conn);

        let mut receipt = CheckoutReceipt::build(&found, order_date, &items, rate, 0);
        if let Some(user_id) = buyer.identity() {
            if self.ctx.identity.email_confirmed(user_id).await? {
                receipt.points_awarded = self.ctx.config.loyalty.points_earned(receipt.total());
            }
        }
        Ok(receipt)
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    async fn finalize_web_order(&self, order_id: &str) -> EngineResult<Finalized> {
        let now = self.ctx.now();
        let mut tx = self.ctx.db.begin().await?;

        let cart = order::get_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;
        if !cart.is_in_cart() {
            return Err(EngineError::OrderNotInCart { order_id: cart.id });
        }
        let buyer = customer_repo::get_customer(&mut *tx, &cart.customer_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Customer", &cart.customer_id))?;

        let mut lines = Vec::new();
        for item in order::list_order_items(&mut *tx, &cart.id).await? {
            let row = inventory::get_priced(&mut *tx, &item.inventory_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Inventory", &item.inventory_id))?;
            lines.push(PricedLine {
                quantity: item.quantity,
                row,
                order_item_id: Some(item.id),
            });
        }
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "cart items".to_string(),
            }
            .into());
        }
        check_lines(&lines)?;

        let rate = discount_rate_for(&*self.ctx.identity, &self.ctx.config.loyalty, &buyer).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = stamped(line, &cart.id, rate, now)?;
            order::stamp_order_item(
                &mut *tx,
                &item.id,
                item.unit_price_cents,
                item.unit_buy_price_cents,
                item.discount_bps,
            )
            .await?;
            ledger::decrement(&mut *tx, &line.row.id, line.quantity).await?;
            items.push((item, line.row.display_name().to_string()));
        }

        order::finalize_order(&mut *tx, &cart.id, now).await?;

        tx.commit().await.map_err(DbError::from)?;

        Ok(Finalized {
            order: Order {
                status: OrderStatus::Ordered,
                order_date: Some(now),
                ..cart
            },
            order_date: now,
            customer: buyer,
            rate,
            items,
        })
    }

    async fn finalize_pos_sale(
        &self,
        shop_id: &str,
        cart_lines: &[CartLine],
        selection: &PosCustomer,
    ) -> EngineResult<Finalized> {
        let now = self.ctx.now();
        let mut tx = self.ctx.db.begin().await?;

        let till = shop::get_shop(&mut *tx, shop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Shop", shop_id))?;
        if till.location_kind != LocationKind::Physical {
            return Err(EngineError::WrongShopKind {
                shop_id: till.id,
                expected: LocationKind::Physical,
            });
        }

        let mut lines = Vec::with_capacity(cart_lines.len());
        for cart_line in cart_lines {
            let row = inventory::get_priced(&mut *tx, &cart_line.inventory_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Inventory", &cart_line.inventory_id))?;
            if row.shop_id != till.id {
                return Err(EngineError::ShopMismatch {
                    inventory_id: row.id,
                    shop_id: till.id,
                });
            }
            lines.push(PricedLine {
                quantity: cart_line.quantity,
                row,
                order_item_id: None,
            });
        }
        check_lines(&lines)?;

        let buyer = resolve_pos_customer(&mut *tx, &*self.ctx.identity, selection, now).await?;
        let rate = discount_rate_for(&*self.ctx.identity, &self.ctx.config.loyalty, &buyer).await?;

        let sale = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: buyer.id.clone(),
            shop_id: till.id.clone(),
            status: OrderStatus::Ordered,
            order_date: Some(now),
            created_at: now,
        };
        order::insert_order(&mut *tx, &sale).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = stamped(line, &sale.id, rate, now)?;
            order::insert_order_item(&mut *tx, &item).await?;
            ledger::decrement(&mut *tx, &line.row.id, line.quantity).await?;
            items.push((item, line.row.display_name().to_string()));
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(Finalized {
            order: sale,
            order_date: now,
            customer: buyer,
            rate,
            items,
        })
    }

    /// Post-commit steps: points, logging, receipt.
    async fn complete(&self, done: Finalized) -> CheckoutReceipt {
        let mut receipt = CheckoutReceipt::build(&done.order, done.order_date, &done.items, done.rate, 0);

        receipt.points_awarded = award_points(
            &*self.ctx.identity,
            &self.ctx.config.loyalty,
            &done.customer,
            receipt.total(),
        )
        .await;

        debug!(order_id = %receipt.order_id, lines = receipt.lines.len(), "Receipt built");
        info!(
            order_id = %receipt.order_id,
            customer_id = %receipt.customer_id,
            shop_id = %receipt.shop_id,
            total_cents = receipt.total_cents,
            discount_bps = receipt.discount_bps,
            points = receipt.points_awarded,
            "Checkout complete"
        );
        receipt
    }
}
