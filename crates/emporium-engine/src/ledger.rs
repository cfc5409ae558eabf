//! # Stock Ledger
//!
//! Every change to `inventory.quantity` goes through here.
//!
//! ## Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity >= 0 for every inventory row, before and after every call    │
//! │                                                                         │
//! │  decrement        UPDATE .. SET quantity = quantity - n                │
//! │                   WHERE id = ? AND quantity >= n                        │
//! │                   0 rows → Conflict (a concurrent sale won)             │
//! │                                                                         │
//! │  transfer_stock   Online row ──(n)──► Physical row (created if absent) │
//! │                                                                         │
//! │  CHECK (quantity >= 0) in the schema backs both                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The functions take the caller's connection so they commit or roll back
//! with the business operation that triggered them.

use chrono::{DateTime, Utc};
use emporium_core::validation::{validate_stock_level, validate_transfer_quantity};
use emporium_core::{CoreError, Inventory, LocationKind, PricedInventory};
use emporium_db::repository::{inventory, shop};
use emporium_db::SqliteConnection;
use serde::Serialize;
use std::future::Future;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, Shortfall};

// =============================================================================
// Decrement
// =============================================================================

/// Takes `quantity` units off one row.
///
/// ## Errors
/// * `Validation` - `quantity` is not positive
/// * `Conflict` - fewer than `quantity` units remain
pub async fn decrement(conn: &mut SqliteConnection, inventory_id: &str, quantity: i64) -> EngineResult<()> {
    validate_transfer_quantity(quantity)?;
    inventory::decrement_stock(conn, inventory_id, quantity).await?;
    Ok(())
}

/// The shortfall of one line, if the row cannot cover it.
pub fn shortfall(row: &PricedInventory, requested: i64) -> Option<Shortfall> {
    if requested <= row.quantity {
        return None;
    }
    Some(Shortfall {
        inventory_id: row.id.clone(),
        item_name: row.display_name().to_string(),
        requested,
        available: row.quantity,
    })
}

/// Sets the absolute stock level of a row.
pub async fn set_quantity(conn: &mut SqliteConnection, inventory_id: &str, quantity: i64) -> EngineResult<()> {
    validate_stock_level(quantity)?;
    inventory::set_quantity(conn, inventory_id, quantity).await?;
    Ok(())
}

// =============================================================================
// Transfer
// =============================================================================

/// Result of moving stock from the Online shop to a Physical shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub item_name: String,
    pub quantity: i64,
    pub source_inventory_id: String,
    pub source_remaining: i64,
    pub destination_inventory_id: String,
    /// Whether the destination row was created by this transfer.
    pub created: bool,
}

/// Moves `quantity` units of the item held by `source_inventory_id` into
/// `to_shop_id`.
///
/// ## Checks (in order)
/// 1. `quantity > 0`
/// 2. the destination shop exists and is Physical
/// 3. the source row exists
/// 4. the source row belongs to the Online shop
/// 5. the source row holds at least `quantity`
///
/// A destination row that does not exist yet is created with the source's
/// sell price.
pub async fn transfer_stock(
    conn: &mut SqliteConnection,
    source_inventory_id: &str,
    to_shop_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> EngineResult<Transfer> {
    validate_transfer_quantity(quantity)?;

    let destination = shop::get_shop(conn, to_shop_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Shop", to_shop_id))?;
    if destination.location_kind != LocationKind::Physical {
        return Err(EngineError::WrongShopKind {
            shop_id: destination.id,
            expected: LocationKind::Physical,
        });
    }

    let source = inventory::get_priced(conn, source_inventory_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Inventory", source_inventory_id))?;
    if source.location_kind != LocationKind::Online {
        return Err(EngineError::WrongShopKind {
            shop_id: source.shop_id,
            expected: LocationKind::Online,
        });
    }
    if source.quantity < quantity {
        return Err(CoreError::InsufficientStock {
            item: source.display_name().to_string(),
            available: source.quantity,
            requested: quantity,
        }
        .into());
    }

    inventory::decrement_stock(conn, &source.id, quantity).await?;

    let (destination_inventory_id, created) =
        match inventory::find_by_shop_and_item(conn, &destination.id, &source.item_id).await? {
            Some(existing) => {
                inventory::increment_stock(conn, &existing.id, quantity).await?;
                (existing.id, false)
            }
            None => {
                let row = Inventory {
                    id: Uuid::new_v4().to_string(),
                    shop_id: destination.id.clone(),
                    item_id: source.item_id.clone(),
                    quantity,
                    sell_price_cents: source.sell_price_cents,
                    created_at: now,
                    updated_at: now,
                };
                inventory::insert_inventory(conn, &row).await?;
                (row.id, true)
            }
        };

    debug!(
        source = %source.id,
        destination = %destination_inventory_id,
        quantity,
        created,
        "Stock transferred"
    );

    Ok(Transfer {
        item_name: source.display_name().to_string(),
        quantity,
        source_inventory_id: source.id.clone(),
        source_remaining: source.quantity - quantity,
        destination_inventory_id,
        created,
    })
}

// =============================================================================
// Conflict retry
// =============================================================================

/// Runs `attempt`, running it once more if it lost a race.
///
/// `retries` above 1 is treated as 1. The second failure is returned as is.
pub async fn retry_on_conflict<T, F, Fut>(retries: u8, operation: &str, mut attempt: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut remaining = retries.min(1);
    loop {
        match attempt().await {
            Err(err) if err.is_retryable() && remaining > 0 => {
                remaining -= 1;
                warn!(operation, error = %err, "Lost a concurrent update, retrying");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::{Item, Shop};
    use emporium_db::{Database, DbConfig};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn shop_row(name: &str, kind: LocationKind) -> Shop {
        let now = Utc::now();
        Shop {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            contact_number: "555-0100".to_string(),
            location_kind: kind,
            address: None,
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item_row(name: &str) -> Item {
        Item {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            buy_price_cents: 200,
            production_date: None,
            description: None,
            categories: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn stock(shop: &Shop, item: &Item, quantity: i64) -> Inventory {
        let now = Utc::now();
        Inventory {
            id: Uuid::new_v4().to_string(),
            shop_id: shop.id.clone(),
            item_id: item.id.clone(),
            quantity,
            sell_price_cents: 500,
            created_at: now,
            updated_at: now,
        }
    }

    struct Fixture {
        db: Database,
        online: Shop,
        physical: Shop,
        source: Inventory,
    }

    async fn fixture(source_qty: i64) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let online = shop_row("Online", LocationKind::Online);
        let physical = shop_row("High Street", LocationKind::Physical);
        let widget = item_row("Widget");
        db.shops().insert(&online).await.unwrap();
        db.shops().insert(&physical).await.unwrap();
        db.items().insert(&widget).await.unwrap();
        let source = stock(&online, &widget, source_qty);
        db.inventory().insert(&source).await.unwrap();
        Fixture { db, online, physical, source }
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let f = fixture(3).await;
        let mut conn = f.db.acquire().await.unwrap();

        decrement(&mut *conn, &f.source.id, 2).await.unwrap();
        let err = decrement(&mut *conn, &f.source.id, 2).await.unwrap_err();
        assert!(err.is_retryable());

        let row = inventory::get_inventory(&mut *conn, &f.source.id).await.unwrap().unwrap();
        assert_eq!(row.quantity, 1);
    }

    #[tokio::test]
    async fn test_transfer_creates_destination_with_source_price() {
        let f = fixture(20).await;
        let mut conn = f.db.acquire().await.unwrap();

        let t = transfer_stock(&mut *conn, &f.source.id, &f.physical.id, 5, Utc::now())
            .await
            .unwrap();
        assert!(t.created);
        assert_eq!(t.source_remaining, 15);
        assert_eq!(t.item_name, "Widget");

        let dest = inventory::get_inventory(&mut *conn, &t.destination_inventory_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dest.quantity, 5);
        assert_eq!(dest.sell_price_cents, 500);

        let again = transfer_stock(&mut *conn, &f.source.id, &f.physical.id, 5, Utc::now())
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.destination_inventory_id, t.destination_inventory_id);
    }

    #[tokio::test]
    async fn test_transfer_checks_shop_kinds() {
        let f = fixture(20).await;
        let mut conn = f.db.acquire().await.unwrap();

        let err = transfer_stock(&mut *conn, &f.source.id, &f.online.id, 5, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::WrongShopKind { expected: LocationKind::Physical, .. }
        ));

        let err = transfer_stock(&mut *conn, &f.source.id, &f.physical.id, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transfer_short_source_changes_nothing() {
        let f = fixture(20).await;
        let mut conn = f.db.acquire().await.unwrap();

        let err = transfer_stock(&mut *conn, &f.source.id, &f.physical.id, 25, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::InsufficientStock { available: 20, .. })));

        let row = inventory::get_inventory(&mut *conn, &f.source.id).await.unwrap().unwrap();
        assert_eq!(row.quantity, 20);
    }

    #[tokio::test]
    async fn test_retry_on_conflict_runs_at_most_twice() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: EngineResult<()> = retry_on_conflict(5, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Conflict("lost".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_skips_non_conflicts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: EngineResult<()> = retry_on_conflict(1, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::not_found("Order", "o-1"))
        })
        .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
