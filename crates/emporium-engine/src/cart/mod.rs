//! # Cart Store
//!
//! One set of line operations, two backings.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CartStore                                       │
//! │   add_or_increment · change_quantity · remove · decrement_one          │
//! │   lines · clear · totals                                               │
//! │            │                                   │                        │
//! │            ▼                                   ▼                        │
//! │   WebCart (web.rs)                    PosCart (pos.rs)                  │
//! │   InCart order + order_items          session["pos_cart:{shop}"]       │
//! │   at the Online shop                  JSON list of CartLine            │
//! │   add clamps to stock on hand         add does not clamp;              │
//! │                                       checkout re-validates            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are keyed by inventory id in both backings: a cart never holds two
//! lines for the same inventory row.

pub mod pos;
pub mod web;

use async_trait::async_trait;
use emporium_core::{CartLine, CartTotals, DiscountRate};
use serde::Serialize;

use crate::error::EngineResult;

/// What an add did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub inventory_id: String,
    /// Line quantity after the add.
    pub quantity: i64,
    /// Whether less than requested was added because stock ran out.
    pub clamped: bool,
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Adds `quantity` units, merging with an existing line.
    async fn add_or_increment(&self, inventory_id: &str, quantity: i64) -> EngineResult<AddOutcome>;

    /// Sets a line's quantity; 0 removes the line.
    async fn change_quantity(&self, inventory_id: &str, quantity: i64) -> EngineResult<()>;

    async fn remove(&self, inventory_id: &str) -> EngineResult<()>;

    /// Takes one unit off a line, removing it at zero. Returns what is left.
    async fn decrement_one(&self, inventory_id: &str) -> EngineResult<i64>;

    async fn lines(&self) -> EngineResult<Vec<CartLine>>;

    async fn clear(&self) -> EngineResult<()>;

    async fn totals(&self, rate: DiscountRate) -> EngineResult<CartTotals> {
        Ok(CartTotals::compute(&self.lines().await?, rate))
    }
}
