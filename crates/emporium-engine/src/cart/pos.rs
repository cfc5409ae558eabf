//! # POS Cart
//!
//! The till's cart for one physical shop. Lives only in the browser
//! session under `pos_cart:{shop_id}`; nothing touches the database until
//! checkout.
//!
//! Adds are not clamped to stock. Checkout checks every line against the
//! stock on hand and rejects the sale if any line is short.

use async_trait::async_trait;
use emporium_core::validation::{validate_new_quantity, validate_quantity};
use emporium_core::{CartLine, LocationKind, PosCartContents, Shop};
use std::sync::Arc;
use tracing::debug;

use super::{AddOutcome, CartStore};
use crate::error::{EngineError, EngineResult};
use crate::session::{pos_cart_key, SessionStore};
use crate::EngineContext;

#[derive(Clone)]
pub struct PosCart {
    ctx: EngineContext,
    shop_id: String,
    session: Arc<dyn SessionStore>,
}

impl PosCart {
    pub fn new(ctx: EngineContext, shop_id: impl Into<String>, session: Arc<dyn SessionStore>) -> Self {
        PosCart {
            ctx,
            shop_id: shop_id.into(),
            session,
        }
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    fn key(&self) -> String {
        pos_cart_key(&self.shop_id)
    }

    /// Current contents; an absent session value is an empty cart.
    pub async fn load(&self) -> EngineResult<PosCartContents> {
        let raw = self.session.get(&self.key()).await?;
        Ok(PosCartContents::from_session_bytes(raw.as_deref())?)
    }

    async fn save(&self, contents: &PosCartContents) -> EngineResult<()> {
        if contents.is_empty() {
            return self.session.remove(&self.key()).await;
        }
        self.session.set(&self.key(), contents.to_session_bytes()?).await
    }

    async fn physical_shop(&self) -> EngineResult<Shop> {
        let shop = self
            .ctx
            .db
            .shops()
            .get_by_id(&self.shop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Shop", &self.shop_id))?;
        if shop.location_kind != LocationKind::Physical {
            return Err(EngineError::WrongShopKind {
                shop_id: shop.id,
                expected: LocationKind::Physical,
            });
        }
        Ok(shop)
    }
}

impl std::fmt::Debug for PosCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosCart").field("shop_id", &self.shop_id).finish_non_exhaustive()
    }
}

#[async_trait]
impl CartStore for PosCart {
    async fn add_or_increment(&self, inventory_id: &str, quantity: i64) -> EngineResult<AddOutcome> {
        validate_quantity(quantity)?;
        let shop = self.physical_shop().await?;

        let row = self
            .ctx
            .db
            .inventory()
            .get_priced(inventory_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Inventory", inventory_id))?;
        if row.shop_id != shop.id {
            return Err(EngineError::ShopMismatch {
                inventory_id: row.id,
                shop_id: shop.id,
            });
        }
        let (sell, buy) = row
            .prices()
            .ok_or_else(|| EngineError::InvalidPrice { inventory_id: row.id.clone() })?;

        let mut contents = self.load().await?;
        let new_quantity = contents.add_or_increment(CartLine::new(row.id.clone(), quantity, sell, buy))?;
        self.save(&contents).await?;

        debug!(shop_id = %shop.id, inventory_id = %row.id, quantity = new_quantity, "Added to POS cart");

        Ok(AddOutcome {
            inventory_id: row.id,
            quantity: new_quantity,
            clamped: false,
        })
    }

    async fn change_quantity(&self, inventory_id: &str, quantity: i64) -> EngineResult<()> {
        validate_new_quantity(quantity)?;
        let mut contents = self.load().await?;
        contents.set_quantity(inventory_id, quantity)?;
        self.save(&contents).await
    }

    async fn remove(&self, inventory_id: &str) -> EngineResult<()> {
        let mut contents = self.load().await?;
        contents.remove(inventory_id)?;
        self.save(&contents).await
    }

    async fn decrement_one(&self, inventory_id: &str) -> EngineResult<i64> {
        let mut contents = self.load().await?;
        let remaining = contents.decrement_one(inventory_id)?;
        self.save(&contents).await?;
        Ok(remaining)
    }

    async fn lines(&self) -> EngineResult<Vec<CartLine>> {
        Ok(self.load().await?.lines)
    }

    async fn clear(&self) -> EngineResult<()> {
        self.session.remove(&self.key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use crate::testing::harness;
    use emporium_core::CoreError;

    #[tokio::test]
    async fn test_session_round_trip() {
        let h = harness().await;
        let a = h.stock(&h.physical, "Widget", 3, 500, 200).await;
        let b = h.stock(&h.physical, "Gadget", 8, 1250, 600).await;
        let session: Arc<dyn SessionStore> = Arc::new(MemorySession::new());

        let cart = h.engine.pos_cart(h.physical.id.clone(), session.clone());
        cart.add_or_increment(&a.id, 2).await.unwrap();
        cart.add_or_increment(&b.id, 1).await.unwrap();
        let before = cart.lines().await.unwrap();

        // A fresh handle over the same session sees the same lines
        let reopened = h.engine.pos_cart(h.physical.id.clone(), session);
        let after = reopened.lines().await.unwrap();
        assert_eq!(before, after);
        assert_eq!(after[1].unit_price, 1250);
        assert_eq!(after[1].unit_buy_price, 600);
    }

    #[tokio::test]
    async fn test_add_is_not_clamped() {
        let h = harness().await;
        let a = h.stock(&h.physical, "Widget", 3, 500, 200).await;
        let cart = h.engine.pos_cart(h.physical.id.clone(), Arc::new(MemorySession::new()));

        let outcome = cart.add_or_increment(&a.id, 5).await.unwrap();
        assert_eq!(outcome.quantity, 5);
        assert!(!outcome.clamped);
    }

    #[tokio::test]
    async fn test_inventory_must_belong_to_the_shop() {
        let h = harness().await;
        let online_row = h.stock(&h.online, "Widget", 3, 500, 200).await;

        let cart = h.engine.pos_cart(h.physical.id.clone(), Arc::new(MemorySession::new()));
        let err = cart.add_or_increment(&online_row.id, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::ShopMismatch { .. }));

        let online_till = h.engine.pos_cart(h.online.id.clone(), Arc::new(MemorySession::new()));
        let err = online_till.add_or_increment(&online_row.id, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::WrongShopKind { .. }));
    }

    #[tokio::test]
    async fn test_decrement_and_clear() {
        let h = harness().await;
        let a = h.stock(&h.physical, "Widget", 3, 500, 200).await;
        let session = Arc::new(MemorySession::new());
        let cart = h.engine.pos_cart(h.physical.id.clone(), session.clone());

        cart.add_or_increment(&a.id, 2).await.unwrap();
        assert_eq!(cart.decrement_one(&a.id).await.unwrap(), 1);
        assert_eq!(cart.decrement_one(&a.id).await.unwrap(), 0);
        assert!(cart.lines().await.unwrap().is_empty());
        assert!(session.get(&pos_cart_key(&h.physical.id)).await.unwrap().is_none());

        let err = cart.decrement_one(&a.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::LineNotInCart(_))));

        cart.add_or_increment(&a.id, 1).await.unwrap();
        cart.clear().await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());
    }
}
