//! # Cart Lines
//!
//! Pure cart math shared by both cart backings, plus the session payload
//! for the POS cart.
//!
//! ## POS Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier Action          Operation                  Lines               │
//! │  ──────────────          ─────────                  ─────               │
//! │  Scan / click item ────► add_or_increment() ──────► qty += n or push    │
//! │  "−" button ───────────► decrement_one() ─────────► qty -= 1, drop at 0 │
//! │  Edit quantity ────────► set_quantity() ──────────► qty = n, drop at 0  │
//! │  Remove ───────────────► remove() ────────────────► retain others       │
//! │  Clear / checkout ─────► clear() ─────────────────► []                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are unique by `inventory_id`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::DiscountRate;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One line of a cart.
///
/// Serialized camelCase; this is the exact POS session payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub inventory_id: String,
    pub quantity: i64,
    /// Sell price in cents when the line was added.
    pub unit_price: i64,
    /// Item buy price in cents when the line was added.
    pub unit_buy_price: i64,
    /// Discount in basis points; 0 until checkout stamps it.
    #[serde(default)]
    pub discount_bps: i64,
}

impl CartLine {
    pub fn new(inventory_id: impl Into<String>, quantity: i64, unit_price: i64, unit_buy_price: i64) -> Self {
        CartLine {
            inventory_id: inventory_id.into(),
            quantity,
            unit_price,
            unit_buy_price,
            discount_bps: 0,
        }
    }

    /// quantity × unit price.
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Cart totals for display and receipts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

impl CartTotals {
    /// Totals for `lines` at one discount rate.
    ///
    /// The discount is rounded per line so the totals match the sum of
    /// the receipt lines.
    pub fn compute(lines: &[CartLine], rate: DiscountRate) -> Self {
        let mut totals = CartTotals {
            line_count: lines.len(),
            ..CartTotals::default()
        };
        for line in lines {
            let subtotal = line.subtotal();
            let discount = subtotal.discount_amount(rate);
            totals.total_quantity += line.quantity;
            totals.subtotal_cents += subtotal.cents();
            totals.discount_cents += discount.cents();
            totals.total_cents += (subtotal - discount).cents();
        }
        totals
    }
}

// =============================================================================
// POS Cart Contents
// =============================================================================

/// The list stored in session for a POS cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PosCartContents {
    pub lines: Vec<CartLine>,
}

impl PosCartContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a session value; an absent value is an empty cart.
    pub fn from_session_bytes(bytes: Option<&[u8]>) -> CoreResult<Self> {
        match bytes {
            None => Ok(Self::new()),
            Some(raw) => {
                serde_json::from_slice(raw).map_err(|e| CoreError::CartDecode(e.to_string()))
            }
        }
    }

    pub fn to_session_bytes(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::CartDecode(e.to_string()))
    }

    pub fn find(&self, inventory_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.inventory_id == inventory_id)
    }

    /// Adds `line`, or increases the quantity of the line already present.
    ///
    /// Returns the resulting quantity.
    pub fn add_or_increment(&mut self, line: CartLine) -> CoreResult<i64> {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.inventory_id == line.inventory_id) {
            let new_qty = existing.quantity + line.quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            existing.quantity = new_qty;
            return Ok(new_qty);
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        let qty = line.quantity;
        self.lines.push(line);
        Ok(qty)
    }

    /// Sets a line's quantity; 0 removes it.
    pub fn set_quantity(&mut self, inventory_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove(inventory_id);
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        match self.lines.iter_mut().find(|l| l.inventory_id == inventory_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::LineNotInCart(inventory_id.to_string())),
        }
    }

    /// Takes one unit off a line, dropping it when it reaches zero.
    ///
    /// Returns the remaining quantity.
    pub fn decrement_one(&mut self, inventory_id: &str) -> CoreResult<i64> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.inventory_id == inventory_id)
            .ok_or_else(|| CoreError::LineNotInCart(inventory_id.to_string()))?;

        self.lines[idx].quantity -= 1;
        let remaining = self.lines[idx].quantity;
        if remaining <= 0 {
            self.lines.remove(idx);
            return Ok(0);
        }
        Ok(remaining)
    }

    pub fn remove(&mut self, inventory_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.inventory_id != inventory_id);
        if self.lines.len() == before {
            return Err(CoreError::LineNotInCart(inventory_id.to_string()));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn totals(&self, rate: DiscountRate) -> CartTotals {
        CartTotals::compute(&self.lines, rate)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_same_inventory_increases_quantity() {
        let mut cart = PosCartContents::new();
        cart.add_or_increment(CartLine::new("inv-1", 2, 999, 500)).unwrap();
        let qty = cart.add_or_increment(CartLine::new("inv-1", 3, 999, 500)).unwrap();

        assert_eq!(qty, 5);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.totals(DiscountRate::zero()).subtotal_cents, 4995);
    }

    #[test]
    fn test_decrement_one_drops_line_at_zero() {
        let mut cart = PosCartContents::new();
        cart.add_or_increment(CartLine::new("inv-1", 2, 100, 50)).unwrap();

        assert_eq!(cart.decrement_one("inv-1").unwrap(), 1);
        assert_eq!(cart.decrement_one("inv-1").unwrap(), 0);
        assert!(cart.is_empty());
        assert!(cart.decrement_one("inv-1").is_err());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = PosCartContents::new();
        cart.add_or_increment(CartLine::new("inv-1", 2, 100, 50)).unwrap();
        cart.set_quantity("inv-1", 0).unwrap();
        assert!(cart.is_empty());
        assert!(cart.set_quantity("inv-1", 4).is_err());
    }

    #[test]
    fn test_quantity_cap() {
        let mut cart = PosCartContents::new();
        cart.add_or_increment(CartLine::new("inv-1", 990, 100, 50)).unwrap();
        let err = cart.add_or_increment(CartLine::new("inv-1", 10, 100, 50));
        assert!(matches!(err, Err(CoreError::QuantityTooLarge { .. })));
    }

    #[test]
    fn test_cart_size_cap() {
        let mut cart = PosCartContents::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_or_increment(CartLine::new(format!("inv-{i}"), 1, 100, 50)).unwrap();
        }
        let err = cart.add_or_increment(CartLine::new("one-more", 1, 100, 50));
        assert!(matches!(err, Err(CoreError::CartTooLarge { .. })));
    }

    #[test]
    fn test_session_round_trip_is_lossless() {
        let mut cart = PosCartContents::new();
        cart.add_or_increment(CartLine::new("inv-1", 3, 1250, 700)).unwrap();
        let mut discounted = CartLine::new("inv-2", 1, 99, 10);
        discounted.discount_bps = 1500;
        cart.add_or_increment(discounted).unwrap();

        let bytes = cart.to_session_bytes().unwrap();
        let back = PosCartContents::from_session_bytes(Some(&bytes)).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_session_payload_shape() {
        let mut cart = PosCartContents::new();
        cart.add_or_increment(CartLine::new("inv-1", 3, 1250, 700)).unwrap();
        let json = String::from_utf8(cart.to_session_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"[{"inventoryId":"inv-1","quantity":3,"unitPrice":1250,"unitBuyPrice":700,"discountBps":0}]"#
        );
    }

    #[test]
    fn test_absent_or_corrupt_session_value() {
        assert!(PosCartContents::from_session_bytes(None).unwrap().is_empty());
        assert!(matches!(
            PosCartContents::from_session_bytes(Some(b"not json")),
            Err(CoreError::CartDecode(_))
        ));
    }

    #[test]
    fn test_totals_round_discount_per_line() {
        let lines = vec![CartLine::new("a", 1, 5, 1), CartLine::new("b", 1, 5, 1)];
        let totals = CartTotals::compute(&lines, DiscountRate::from_bps(1000));
        // each 5¢ line loses 1¢ (0.5 rounds up)
        assert_eq!(totals.discount_cents, 2);
        assert_eq!(totals.total_cents, 8);
        assert_eq!(totals.line_count, 2);
    }
}
