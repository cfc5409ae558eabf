//! # Validation Module
//!
//! Input checks run before any write.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP layer        form/CSRF checks (external)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE       quantities, prices, names, ids              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite            CHECK (quantity >= 0), UNIQUE, FOREIGN KEY  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use emporium_core::validation::{validate_quantity, validate_transfer_quantity};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_quantity(0).is_err());
//! assert!(validate_transfer_quantity(5_000).is_ok());
//! ```

pub use crate::error::ValidationResult;

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Shop names: 1-100 characters.
pub fn validate_shop_name(name: &str) -> ValidationResult<()> {
    validate_text("shop name", name, 100)
}

/// Contact numbers: 1-30 characters of digits, spaces, `+`, `-`, `(`, `)`.
pub fn validate_contact_number(contact: &str) -> ValidationResult<()> {
    validate_text("contact number", contact, 30)?;

    if !contact
        .trim()
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "contact number".to_string(),
            reason: "must contain only digits, spaces and + - ( )".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn within(field: &str, value: i64, min: i64, max: i64) -> ValidationResult<()> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    if min == 1 && value < 1 {
        return Err(ValidationError::MustBePositive { field: field.to_string() });
    }
    Err(ValidationError::OutOfRange {
        field: field.to_string(),
        min,
        max,
    })
}

/// A cart quantity: 1..=999.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    within("quantity", qty, 1, MAX_ITEM_QUANTITY)
}

/// A new cart quantity where 0 means "remove": 0..=999.
pub fn validate_new_quantity(qty: i64) -> ValidationResult<()> {
    within("quantity", qty, 0, MAX_ITEM_QUANTITY)
}

/// A restock transfer quantity: any positive amount.
pub fn validate_transfer_quantity(qty: i64) -> ValidationResult<()> {
    within("transfer quantity", qty, 1, i64::MAX)
}

/// An absolute stock level set by an administrator.
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    within("stock quantity", qty, 0, i64::MAX)
}

/// Zero is allowed for giveaways.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    within("price", cents, 0, i64::MAX)
}

/// Whether one more line fits in a cart holding `current_lines`.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
