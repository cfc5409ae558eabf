//! # Reports
//!
//! Sales figures and account status. Sales come only from finalized order
//! lines, priced from their checkout snapshot, so later price edits never
//! change history.
//!
//! ```text
//! revenue = Σ paid            paid   = qty × unit price − line discount
//! profit  = Σ paid − qty × unit buy price
//! ```

use emporium_core::{Order, SalesSummary, Tier};
use emporium_db::repository::{customer, inventory, order, shop};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::EngineContext;

/// Orders listed on the account page.
const RECENT_ORDER_LIMIT: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySales {
    pub inventory_id: String,
    pub item_name: String,
    pub summary: SalesSummary,
}

/// One shop's sales, in total and per inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopSales {
    pub shop_id: String,
    pub summary: SalesSummary,
    /// Rows with at least one sale, by item name.
    pub inventory: Vec<InventorySales>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub user_id: String,
    pub points: i64,
    pub tier: Tier,
    pub next_tier: Option<Tier>,
    pub points_to_next: Option<i64>,
    pub email_confirmed: bool,
    /// Newest first.
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Clone)]
pub struct Reports {
    ctx: EngineContext,
}

impl Reports {
    pub fn new(ctx: EngineContext) -> Self {
        Reports { ctx }
    }

    pub async fn inventory_sales(&self, inventory_id: &str) -> EngineResult<InventorySales> {
        let mut conn = self.ctx.db.acquire().await?;

        let row = inventory::get_priced(&mut *conn, inventory_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Inventory", inventory_id))?;
        let lines = order::sold_lines_for_inventory(&mut *conn, inventory_id).await?;

        Ok(InventorySales {
            item_name: row.display_name().to_string(),
            inventory_id: row.id,
            summary: lines.iter().collect(),
        })
    }

    pub async fn shop_sales(&self, shop_id: &str) -> EngineResult<ShopSales> {
        let mut conn = self.ctx.db.acquire().await?;

        let names: BTreeMap<String, String> = inventory::list_for_shop(&mut *conn, shop_id)
            .await?
            .into_iter()
            .map(|row| (row.id.clone(), row.display_name().to_string()))
            .collect();
        if names.is_empty() && shop::get_shop(&mut *conn, shop_id).await?.is_none() {
            return Err(EngineError::not_found("Shop", shop_id));
        }
        let lines = order::sold_lines_for_shop(&mut *conn, shop_id).await?;

        let mut per_row: BTreeMap<&str, SalesSummary> = BTreeMap::new();
        for line in &lines {
            per_row.entry(line.inventory_id.as_str()).or_default().record(line);
        }

        let mut rows: Vec<InventorySales> = per_row
            .into_iter()
            .map(|(id, summary)| InventorySales {
                inventory_id: id.to_string(),
                item_name: names.get(id).cloned().unwrap_or_else(|| id.to_string()),
                summary,
            })
            .collect();
        rows.sort_by(|a, b| a.item_name.cmp(&b.item_name));

        Ok(ShopSales {
            shop_id: shop_id.to_string(),
            summary: lines.iter().collect(),
            inventory: rows,
        })
    }

    /// Points, tier and the latest orders of a registered user.
    ///
    /// A user who never shopped has no customer row yet and no orders.
    pub async fn account_status(&self, user_id: &str) -> EngineResult<AccountStatus> {
        let identity = &*self.ctx.identity;
        let schedule = &self.ctx.config.loyalty;

        let points = identity.account_points(user_id).await?;
        let email_confirmed = identity.email_confirmed(user_id).await?;
        let next = schedule.next_tier(points);

        let recent_orders = {
            let mut conn = self.ctx.db.acquire().await?;
            match customer::find_by_user_id(&mut *conn, user_id).await? {
                Some(c) => order::recent_orders(&mut *conn, &c.id, RECENT_ORDER_LIMIT).await?,
                None => Vec::new(),
            }
        };

        Ok(AccountStatus {
            user_id: user_id.to_string(),
            points,
            tier: schedule.tier_for(points),
            next_tier: next.map(|(tier, _)| tier),
            points_to_next: next.map(|(_, gap)| gap),
            email_confirmed,
            recent_orders,
        })
    }
}
