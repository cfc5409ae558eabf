//! # emporium-core: Pure Business Logic for Emporium
//!
//! Domain types and rules shared by the web storefront and the in-store POS.
//! Everything here is a pure function over plain data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            HTTP layer (storefront pages, POS screens)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     emporium-engine: carts, checkout, restock, customers        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ emporium-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  loyalty  │  │   cart    │  │   │
//! │  │   │ Shop Item │  │   Money   │  │   Tier    │  │ CartLine  │  │   │
//! │  │   │ Inventory │  │  rounding │  │ Schedule  │  │ PosCart   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  emporium-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Shops, items, inventory, customers, orders
//! - [`money`] - Money type with integer arithmetic
//! - [`loyalty`] - Loyalty tiers, discount rates, point accrual
//! - [`cart`] - Cart line items and totals
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use emporium_core::loyalty::{LoyaltySchedule, Tier};
//! use emporium_core::money::Money;
//!
//! let schedule = LoyaltySchedule::default();
//! assert_eq!(schedule.tier_for(150), Tier::Gold);
//!
//! // Gold is 10% off
//! let paid = schedule.apply_discount(Money::from_cents(10_000), 150);
//! assert_eq!(paid.cents(), 9_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartLine, CartTotals, PosCartContents};
pub use error::{CoreError, CoreResult, ValidationError};
pub use loyalty::{LoyaltySchedule, Tier, TierThreshold};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a cart.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Loyalty points earned per whole currency unit paid.
pub const POINTS_PER_DOLLAR: i64 = 10;
