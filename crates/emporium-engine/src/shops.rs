//! # Shop Administration
//!
//! Shops and their inventory rows.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_shop        Owner role · one Online shop · one shop per owner   │
//! │  update_shop        Owner role or shop owner                            │
//! │                     shop owners change name and contact only            │
//! │                     Online → Physical never; Physical → Online only     │
//! │                     while no Online shop exists                         │
//! │  create_inventory   Owner role · one row per (shop, item)               │
//! │  set_sell_price     Owner role or shop owner                            │
//! │  set_quantity       Owner role only                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authorization is checked before anything else.

use emporium_core::validation::{validate_contact_number, validate_price_cents, validate_shop_name, validate_stock_level};
use emporium_core::{Inventory, LocationKind, Shop, ValidationError};
use emporium_db::repository::{inventory, item, shop};
use emporium_db::{DbError, SqliteConnection};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::EngineContext;

/// Fields of a new shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShop {
    pub name: String,
    pub contact_number: String,
    pub location_kind: LocationKind,
    pub address: Option<String>,
    pub owner_id: Option<String>,
}

/// Fields of a new inventory row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventory {
    pub shop_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub sell_price_cents: i64,
}

fn only_online_shop() -> EngineError {
    ValidationError::Duplicate {
        field: "location_kind".to_string(),
        value: LocationKind::Online.to_string(),
    }
    .into()
}

/// Maps the index backstop to the same error as the up-front check.
fn online_conflict(err: DbError) -> EngineError {
    match err {
        DbError::UniqueViolation { ref field, .. } if field.contains("location_kind") => only_online_shop(),
        other => other.into(),
    }
}

/// A user owns at most one shop; `except` is the shop being edited.
async fn ensure_owns_no_shop(conn: &mut SqliteConnection, owner: &str, except: Option<&str>) -> EngineResult<()> {
    let taken = shop::list_shops(conn)
        .await?
        .iter()
        .any(|s| s.is_owned_by(owner) && Some(s.id.as_str()) != except);
    if taken {
        return Err(ValidationError::Duplicate {
            field: "owner_id".to_string(),
            value: owner.to_string(),
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ShopAdmin {
    ctx: EngineContext,
}

impl ShopAdmin {
    pub fn new(ctx: EngineContext) -> Self {
        ShopAdmin { ctx }
    }

    pub async fn is_owner_role(&self, user_id: &str) -> EngineResult<bool> {
        self.ctx
            .identity
            .is_in_role(user_id, &self.ctx.config.roles.owner_role)
            .await
    }

    /// Whether `user_id` holds the Owner role or owns `shop_id`.
    pub async fn can_manage(&self, user_id: &str, shop_id: &str) -> EngineResult<bool> {
        if self.is_owner_role(user_id).await? {
            return Ok(true);
        }
        let found = self.ctx.db.shops().get_by_id(shop_id).await?;
        Ok(found.map(|s| s.is_owned_by(user_id)).unwrap_or(false))
    }

    async fn require_owner_role(&self, user_id: &str, action: &str) -> EngineResult<()> {
        if !self.is_owner_role(user_id).await? {
            return Err(EngineError::unauthorized(user_id, action));
        }
        Ok(())
    }

    async fn require_manager(&self, user_id: &str, shop_id: &str, action: &str) -> EngineResult<()> {
        if !self.can_manage(user_id, shop_id).await? {
            return Err(EngineError::unauthorized(user_id, action));
        }
        Ok(())
    }

    pub async fn get(&self, shop_id: &str) -> EngineResult<Shop> {
        self.ctx
            .db
            .shops()
            .get_by_id(shop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Shop", shop_id))
    }

    pub async fn list(&self) -> EngineResult<Vec<Shop>> {
        Ok(self.ctx.db.shops().list().await?)
    }

    // =========================================================================
    // Shops
    // =========================================================================

    pub async fn create_shop(&self, actor: &str, new: NewShop) -> EngineResult<Shop> {
        self.require_owner_role(actor, "create shops").await?;
        validate_shop_name(&new.name)?;
        validate_contact_number(&new.contact_number)?;

        let mut tx = self.ctx.db.begin().await?;

        if new.location_kind == LocationKind::Online && shop::find_online_shop(&mut *tx).await?.is_some() {
            return Err(only_online_shop());
        }
        if let Some(owner) = new.owner_id.as_deref() {
            ensure_owns_no_shop(&mut *tx, owner, None).await?;
        }

        let now = self.ctx.now();
        let created = Shop {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            contact_number: new.contact_number,
            location_kind: new.location_kind,
            address: new.address,
            owner_id: new.owner_id,
            created_at: now,
            updated_at: now,
        };
        shop::insert_shop(&mut *tx, &created).await.map_err(online_conflict)?;
        tx.commit().await.map_err(DbError::from)?;

        info!(id = %created.id, name = %created.name, kind = %created.location_kind, "Shop created");
        Ok(created)
    }

    /// Applies `changes` to a shop.
    ///
    /// A shop owner without the Owner role keeps the shop's kind, address
    /// and owner whatever `changes` says.
    pub async fn update_shop(&self, actor: &str, shop_id: &str, changes: NewShop) -> EngineResult<Shop> {
        self.require_manager(actor, shop_id, "edit this shop").await?;
        validate_shop_name(&changes.name)?;
        validate_contact_number(&changes.contact_number)?;
        let full_control = self.is_owner_role(actor).await?;

        let mut tx = self.ctx.db.begin().await?;
        let current = shop::get_shop(&mut *tx, shop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Shop", shop_id))?;

        let mut updated = Shop {
            name: changes.name,
            contact_number: changes.contact_number,
            updated_at: self.ctx.now(),
            ..current.clone()
        };

        if full_control {
            match (current.location_kind, changes.location_kind) {
                (LocationKind::Online, LocationKind::Physical) => {
                    return Err(ValidationError::NotAllowed {
                        field: "location_kind".to_string(),
                        allowed: vec![LocationKind::Online.to_string()],
                    }
                    .into());
                }
                (LocationKind::Physical, LocationKind::Online) => {
                    if shop::find_online_shop(&mut *tx).await?.is_some() {
                        return Err(only_online_shop());
                    }
                }
                _ => {}
            }
            if let Some(owner) = changes.owner_id.as_deref() {
                ensure_owns_no_shop(&mut *tx, owner, Some(shop_id)).await?;
            }
            updated.location_kind = changes.location_kind;
            updated.address = changes.address;
            updated.owner_id = changes.owner_id;
        }

        shop::update_shop(&mut *tx, &updated).await.map_err(online_conflict)?;
        tx.commit().await.map_err(DbError::from)?;

        info!(id = %updated.id, "Shop updated");
        Ok(updated)
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    pub async fn create_inventory(&self, actor: &str, new: NewInventory) -> EngineResult<Inventory> {
        self.require_owner_role(actor, "add inventory").await?;
        validate_stock_level(new.quantity)?;
        validate_price_cents(new.sell_price_cents)?;

        let mut tx = self.ctx.db.begin().await?;

        let target = shop::get_shop(&mut *tx, &new.shop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Shop", &new.shop_id))?;
        let stocked = item::get_item(&mut *tx, &new.item_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Item", &new.item_id))?;
        if inventory::find_by_shop_and_item(&mut *tx, &target.id, &stocked.id)
            .await?
            .is_some()
        {
            return Err(ValidationError::Duplicate {
                field: "item".to_string(),
                value: format!("{} at {}", stocked.name, target.name),
            }
            .into());
        }

        let now = self.ctx.now();
        let row = Inventory {
            id: Uuid::new_v4().to_string(),
            shop_id: target.id,
            item_id: stocked.id,
            quantity: new.quantity,
            sell_price_cents: new.sell_price_cents,
            created_at: now,
            updated_at: now,
        };
        inventory::insert_inventory(&mut *tx, &row).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(id = %row.id, shop_id = %row.shop_id, quantity = row.quantity, "Inventory created");
        Ok(row)
    }

    pub async fn set_sell_price(&self, actor: &str, inventory_id: &str, sell_price_cents: i64) -> EngineResult<()> {
        let row = self.inventory_row(inventory_id).await?;
        self.require_manager(actor, &row.shop_id, "change prices").await?;
        validate_price_cents(sell_price_cents)?;

        self.ctx
            .db
            .inventory()
            .set_sell_price(inventory_id, sell_price_cents)
            .await?;
        info!(id = %inventory_id, sell_price_cents, "Sell price changed");
        Ok(())
    }

    /// Sets stock on hand. Owner role only.
    pub async fn set_quantity(&self, actor: &str, inventory_id: &str, quantity: i64) -> EngineResult<()> {
        self.require_owner_role(actor, "change stock levels").await?;

        let mut conn = self.ctx.db.acquire().await?;
        ledger::set_quantity(&mut *conn, inventory_id, quantity).await?;
        info!(id = %inventory_id, quantity, "Stock level set");
        Ok(())
    }

    async fn inventory_row(&self, inventory_id: &str) -> EngineResult<Inventory> {
        self.ctx
            .db
            .inventory()
            .get_by_id(inventory_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Inventory", inventory_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;

    fn physical(name: &str, owner: Option<&str>) -> NewShop {
        NewShop {
            name: name.to_string(),
            contact_number: "555-0199".to_string(),
            location_kind: LocationKind::Physical,
            address: Some("1 Main St".to_string()),
            owner_id: owner.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_second_online_shop_rejected() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;

        let mut online = physical("Web Two", None);
        online.location_kind = LocationKind::Online;
        let err = h.engine.shops().create_shop("boss", online).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::Duplicate { .. })));

        let shops = h.engine.shops().list().await.unwrap();
        assert_eq!(shops.iter().filter(|s| s.is_online()).count(), 1);
    }

    #[tokio::test]
    async fn test_online_shop_cannot_become_physical() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;

        let mut changes = physical("Emporium Online", None);
        changes.location_kind = LocationKind::Physical;
        let err = h
            .engine
            .shops()
            .update_shop("boss", &h.online.id, changes)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::NotAllowed { .. })));
        assert!(h.engine.shops().get(&h.online.id).await.unwrap().is_online());
    }

    #[tokio::test]
    async fn test_shop_creation_needs_owner_role() {
        let h = harness().await;
        let err = h
            .engine
            .shops()
            .create_shop("clerk", physical("Kiosk", None))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_one_shop_per_owner() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let admin = h.engine.shops();

        admin.create_shop("boss", physical("Kiosk", Some("pat"))).await.unwrap();
        let err = admin
            .create_shop("boss", physical("Stall", Some("pat")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_reassigning_owner_keeps_one_shop_per_owner() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let admin = h.engine.shops();
        let kiosk = admin.create_shop("boss", physical("Kiosk", Some("pat"))).await.unwrap();
        let stall = admin.create_shop("boss", physical("Stall", Some("sam"))).await.unwrap();

        let err = admin
            .update_shop("boss", &stall.id, physical("Stall", Some("pat")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::Duplicate { .. })));
        assert_eq!(admin.get(&stall.id).await.unwrap().owner_id.as_deref(), Some("sam"));

        // Keeping the current owner is not a second shop
        let renamed = admin
            .update_shop("boss", &kiosk.id, physical("Kiosk Two", Some("pat")))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Kiosk Two");
        assert_eq!(renamed.owner_id.as_deref(), Some("pat"));
    }

    #[tokio::test]
    async fn test_shop_owner_edits_name_only() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let admin = h.engine.shops();
        let kiosk = admin.create_shop("boss", physical("Kiosk", Some("pat"))).await.unwrap();

        let mut changes = physical("Pat's Kiosk", Some("someone-else"));
        changes.address = None;
        let updated = admin.update_shop("pat", &kiosk.id, changes).await.unwrap();

        assert_eq!(updated.name, "Pat's Kiosk");
        assert_eq!(updated.owner_id.as_deref(), Some("pat"));
        assert_eq!(updated.address.as_deref(), Some("1 Main St"));

        let err = admin
            .update_shop("pat", &h.physical.id, physical("Mine now", None))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_inventory_rows_are_unique_per_shop_and_item() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let existing = h.stock(&h.physical, "Widget", 1, 500, 200).await;

        let err = h
            .engine
            .shops()
            .create_inventory(
                "boss",
                NewInventory {
                    shop_id: h.physical.id.clone(),
                    item_id: existing.item_id.clone(),
                    quantity: 5,
                    sell_price_cents: 600,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::Duplicate { .. })));

        let created = h
            .engine
            .shops()
            .create_inventory(
                "boss",
                NewInventory {
                    shop_id: h.online.id.clone(),
                    item_id: existing.item_id.clone(),
                    quantity: 5,
                    sell_price_cents: 600,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.quantity, 5);
    }

    #[tokio::test]
    async fn test_quantity_edits_are_owner_only() {
        let h = harness().await;
        h.identity.grant_role("boss", "Owner").await;
        let admin = h.engine.shops();
        let kiosk = admin.create_shop("boss", physical("Kiosk", Some("pat"))).await.unwrap();
        let row = h.stock(&kiosk, "Widget", 4, 500, 200).await;

        admin.set_sell_price("pat", &row.id, 550).await.unwrap();
        let err = admin.set_quantity("pat", &row.id, 40).await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));

        admin.set_quantity("boss", &row.id, 40).await.unwrap();
        let err = admin.set_quantity("boss", &row.id, -1).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let stored = h.engine.db().inventory().get_by_id(&row.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 40);
        assert_eq!(stored.sell_price_cents, 550);
    }
}
