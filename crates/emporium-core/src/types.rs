//! # Domain Types
//!
//! Core domain types shared by the storefront and the POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐        ┌───────────────┐       ┌───────────────┐    │
//! │  │     Shop      │ 1    * │   Inventory   │ *   1 │     Item      │    │
//! │  │  ───────────  │───────►│  ───────────  │◄──────│  ───────────  │    │
//! │  │  location_kind│        │  quantity ≥ 0 │       │  buy_price    │    │
//! │  │  owner_id     │        │  sell_price   │       │  categories   │    │
//! │  └───────────────┘        └───────▲───────┘       └───────────────┘    │
//! │                                   │                                     │
//! │  ┌───────────────┐        ┌───────┴───────┐                            │
//! │  │    Order      │ 1    * │   OrderItem   │  prices + discount         │
//! │  │  ───────────  │───────►│  ───────────  │  snapshotted at checkout   │
//! │  │  InCart ──►   │        │  quantity     │                            │
//! │  │     Ordered   │        │  unit prices  │                            │
//! │  └───────▲───────┘        └───────────────┘                            │
//! │          │                                                              │
//! │  ┌───────┴───────┐                                                     │
//! │  │   Customer    │  guest XOR linked to a user identity                │
//! │  └───────────────┘                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity id is a UUID v4 string.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// A discount rate in basis points (1000 = 10%).
///
/// Always below 100%: a discount never makes a line free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Upper bound (exclusive) in basis points.
    pub const MAX_BPS: u32 = 10_000;

    /// Creates a rate from basis points, capped just below 100%.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        if bps >= Self::MAX_BPS {
            DiscountRate(Self::MAX_BPS - 1)
        } else {
            DiscountRate(bps)
        }
    }

    /// Reads a rate stored as an integer column; negative values clamp to 0.
    #[inline]
    pub fn from_stored(bps: i64) -> Self {
        DiscountRate::from_bps(bps.clamp(0, Self::MAX_BPS as i64) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// The rate as a fraction in [0, 1), for display only.
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Shop
// =============================================================================

/// Where a shop sells from.
///
/// Exactly one shop is `Online`; it doubles as the warehouse every
/// `Physical` shop restocks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Online,
    Physical,
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationKind::Online => write!(f, "online"),
            LocationKind::Physical => write!(f, "physical"),
        }
    }
}

/// A selling location.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub contact_number: String,
    pub location_kind: LocationKind,
    /// Street address; physical shops only.
    pub address: Option<String>,
    /// User id of the shop owner (not the global Owner role).
    pub owner_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    #[inline]
    pub fn is_online(&self) -> bool {
        self.location_kind == LocationKind::Online
    }

    #[inline]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id)
    }
}

// =============================================================================
// Item
// =============================================================================

/// A catalog entry. The buy price is the price of record; what a shop
/// charges lives on [`Inventory`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub buy_price_cents: i64,
    #[ts(as = "Option<String>")]
    pub production_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Loaded separately from `item_categories`.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub categories: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Item {
    #[inline]
    pub fn buy_price(&self) -> Money {
        Money::from_cents(self.buy_price_cents)
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Stock and sell price of one item at one shop.
///
/// ## Invariants
/// - `quantity >= 0`
/// - one row per (shop_id, item_id)
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Inventory {
    pub id: String,
    pub shop_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub sell_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_cents(self.sell_price_cents)
    }

    /// Whether `requested` units can be taken from this row.
    #[inline]
    pub fn can_supply(&self, requested: i64) -> bool {
        requested <= self.quantity
    }
}

/// An inventory row joined with the fields needed to price it.
///
/// `buy_price_cents` and `item_name` are `None` when the item row is
/// missing, which callers report as an invalid price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PricedInventory {
    pub id: String,
    pub shop_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub sell_price_cents: i64,
    pub location_kind: LocationKind,
    pub item_name: Option<String>,
    pub buy_price_cents: Option<i64>,
}

impl PricedInventory {
    /// Returns `(sell, buy)` when both prices are usable.
    pub fn prices(&self) -> Option<(i64, i64)> {
        match self.buy_price_cents {
            Some(buy) if self.sell_price_cents >= 0 && buy >= 0 => {
                Some((self.sell_price_cents, buy))
            }
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.item_name.as_deref().unwrap_or(&self.item_id)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A buyer. Registered customers link to exactly one user identity;
/// guests never do.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub user_id: Option<String>,
    pub is_guest: bool,
    pub email_confirmed: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// The linked identity, for registered customers only.
    pub fn identity(&self) -> Option<&str> {
        if self.is_guest {
            None
        } else {
            self.user_id.as_deref()
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// Order lifecycle. `InCart → Ordered` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accumulating lines in a web cart.
    InCart,
    /// Finalized by checkout. Terminal.
    Ordered,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::InCart
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub shop_id: String,
    pub status: OrderStatus,
    /// Set only when the order is finalized.
    #[ts(as = "Option<String>")]
    pub order_date: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn is_in_cart(&self) -> bool {
        self.status == OrderStatus::InCart
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line of an order.
///
/// `unit_price_cents` is the pre-discount sell price and `discount_bps` the
/// rate applied at checkout; the amount paid is derived. Both prices and the
/// rate are frozen once the parent order is `Ordered`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub inventory_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_buy_price_cents: i64,
    pub discount_bps: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn discount_rate(&self) -> DiscountRate {
        DiscountRate::from_stored(self.discount_bps)
    }

    /// quantity × unit price, before discount.
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    /// What the customer paid for this line.
    pub fn paid(&self) -> Money {
        self.subtotal().apply_discount(self.discount_rate())
    }

    /// Paid amount minus cost of goods.
    pub fn profit(&self) -> Money {
        self.paid() - Money::from_cents(self.unit_buy_price_cents).multiply_quantity(self.quantity)
    }
}

/// An order line joined with its inventory and item, for display and for
/// checkout validation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLineView {
    pub order_item_id: String,
    pub order_id: String,
    pub inventory_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_buy_price_cents: i64,
    pub discount_bps: i64,
    pub shop_id: String,
    pub item_id: String,
    pub item_name: Option<String>,
    /// Current stock on hand.
    pub stock_quantity: i64,
    /// Current inventory sell price.
    pub current_sell_price_cents: i64,
    /// Current item buy price.
    pub current_buy_price_cents: Option<i64>,
}

// =============================================================================
// Reporting
// =============================================================================

/// Units sold, revenue and profit over a set of finalized order lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub units_sold: i64,
    pub revenue_cents: i64,
    pub profit_cents: i64,
}

impl SalesSummary {
    /// Folds one finalized line into the summary.
    pub fn record(&mut self, line: &OrderItem) {
        self.units_sold += line.quantity;
        self.revenue_cents += line.paid().cents();
        self.profit_cents += line.profit().cents();
    }
}

impl<'a> FromIterator<&'a OrderItem> for SalesSummary {
    fn from_iter<I: IntoIterator<Item = &'a OrderItem>>(iter: I) -> Self {
        let mut summary = SalesSummary::default();
        for line in iter {
            summary.record(line);
        }
        summary
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
