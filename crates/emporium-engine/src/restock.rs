//! # Restock
//!
//! Moves stock from the Online warehouse into a physical shop.
//!
//! ```text
//! restock(actor, shop, source, n)
//!   │
//!   ├── actor has the Owner role or owns the shop?   no → Unauthorized
//!   │                                                     (before anything else)
//!   └── one transaction
//!         └── ledger::transfer_stock(source, shop, n)
//!               qty > 0 · shop Physical · source Online · source ≥ n
//! ```

use emporium_db::DbError;
use serde::Serialize;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::shops::ShopAdmin;
use crate::EngineContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockOutcome {
    pub item_name: String,
    pub quantity: i64,
    pub destination_inventory_id: String,
    /// The shop had no row for this item before.
    pub created: bool,
    /// Units left at the Online shop.
    pub source_remaining: i64,
}

#[derive(Debug, Clone)]
pub struct Restock {
    ctx: EngineContext,
}

impl Restock {
    pub fn new(ctx: EngineContext) -> Self {
        Restock { ctx }
    }

    /// Whether `user_id` may restock `shop_id`.
    ///
    /// A shop that does not exist is only manageable by the global owner
    /// role; the missing shop is then reported by validation.
    pub async fn can_manage(&self, user_id: &str, shop_id: &str) -> EngineResult<bool> {
        ShopAdmin::new(self.ctx.clone()).can_manage(user_id, shop_id).await
    }

    /// Transfers `quantity` units of `source_inventory_id` into `shop_id`.
    ///
    /// ## Errors
    /// * `Unauthorized` - checked first
    /// * `Validation` - quantity not positive
    /// * `NotFound` - shop or source row missing
    /// * `WrongShopKind` - shop not Physical, or source not at the Online shop
    /// * `Domain(InsufficientStock)` - source holds fewer than `quantity`
    pub async fn restock(
        &self,
        actor_user_id: &str,
        shop_id: &str,
        source_inventory_id: &str,
        quantity: i64,
    ) -> EngineResult<RestockOutcome> {
        if !self.can_manage(actor_user_id, shop_id).await? {
            return Err(EngineError::unauthorized(actor_user_id, format!("restock shop {shop_id}")));
        }

        let retries = self.ctx.config.checkout.conflict_retries;
        let transfer = ledger::retry_on_conflict(retries, "restock", move || async move {
            let mut tx = self.ctx.db.begin().await?;
            let transfer =
                ledger::transfer_stock(&mut *tx, source_inventory_id, shop_id, quantity, self.ctx.now()).await?;
            tx.commit().await.map_err(DbError::from)?;
            Ok::<_, EngineError>(transfer)
        })
        .await?;

        info!(
            actor = %actor_user_id,
            shop_id = %shop_id,
            item = %transfer.item_name,
            quantity,
            created = transfer.created,
            "Restock complete"
        );

        Ok(RestockOutcome {
            item_name: transfer.item_name,
            quantity: transfer.quantity,
            destination_inventory_id: transfer.destination_inventory_id,
            created: transfer.created,
            source_remaining: transfer.source_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use emporium_core::CoreError;

    #[tokio::test]
    async fn test_restock_creates_row_with_inherited_price() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let source = h.stock(&h.online, "Widget", 20, 750, 300).await;

        let outcome = h
            .engine
            .restock()
            .restock("boss", &h.physical.id, &source.id, 5)
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.item_name, "Widget");
        assert_eq!(outcome.quantity, 5);
        assert_eq!(h.quantity(&source.id).await, 15);

        let dest = h
            .engine
            .db()
            .inventory()
            .get_by_id(&outcome.destination_inventory_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dest.quantity, 5);
        assert_eq!(dest.sell_price_cents, 750);
        assert_eq!(dest.shop_id, h.physical.id);
    }

    #[tokio::test]
    async fn test_restock_more_than_available_changes_nothing() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let source = h.stock(&h.online, "Widget", 20, 750, 300).await;

        let err = h
            .engine
            .restock()
            .restock("boss", &h.physical.id, &source.id, 25)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::InsufficientStock { .. })));

        assert_eq!(h.quantity(&source.id).await, 20);
        let rows = h.engine.db().inventory().list_for_shop(&h.physical.id).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_non_owner_denied_before_validation() {
        let h = harness().await;
        h.identity.add_user("clerk", 0, true).await;

        // Invalid quantity and missing source, yet authorization is reported
        let err = h
            .engine
            .restock()
            .restock("clerk", &h.physical.id, "missing", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_shop_owner_may_restock_own_shop() {
        let h = harness().await;
        let mut owned = crate::testing::shop("Corner", emporium_core::LocationKind::Physical);
        owned.owner_id = Some("manager".to_string());
        h.engine.db().shops().insert(&owned).await.unwrap();
        let source = h.stock(&h.online, "Widget", 20, 750, 300).await;

        let restock = h.engine.restock();
        assert!(restock.can_manage("manager", &owned.id).await.unwrap());
        assert!(!restock.can_manage("manager", &h.physical.id).await.unwrap());

        restock.restock("manager", &owned.id, &source.id, 2).await.unwrap();
        let err = restock
            .restock("manager", &h.physical.id, &source.id, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }
}
