//! # emporium-engine: Carts, Checkout and Restock
//!
//! The order engine behind the Emporium web storefront and in-store POS.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Engine                                  │
//! │                                                                         │
//! │  HTTP layer ──► Emporium (facade)                                      │
//! │                    │                                                    │
//! │     ┌──────────────┼───────────────┬──────────────┬──────────────┐     │
//! │     ▼              ▼               ▼              ▼              ▼     │
//! │  WebCart        PosCart        Checkout        Restock       ShopAdmin │
//! │  (InCart order) (session)         │               │          Reports   │
//! │     │              │              │               │                     │
//! │     └──────┬───────┘              └──── ledger ───┘                     │
//! │            ▼                            (stock)                         │
//! │     CustomerResolver                                                    │
//! │                                                                         │
//! │  Ports:  IdentityProvider   SessionStore   Clock                        │
//! │  Storage: emporium-db (one sqlx transaction per checkout/restock)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let engine = Emporium::open(EngineConfig::load_or_default(None), identity).await?;
//!
//! let customer = engine.customers().current(&*session).await?;
//! engine.web_cart(customer).add_or_increment(&inventory_id, 2).await?;
//! let receipt = engine.checkout().checkout_order(&order_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod customer;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod reports;
pub mod restock;
pub mod session;
pub mod shops;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart::pos::PosCart;
pub use cart::web::WebCart;
pub use cart::{AddOutcome, CartStore};
pub use checkout::{Checkout, CheckoutReceipt, PosCustomer, ReceiptLine};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use customer::{CustomerResolver, DiscountPreview};
pub use error::{EngineError, EngineResult, ErrorKind, Shortfall};
pub use identity::{IdentityProvider, MemoryIdentityProvider};
pub use reports::{AccountStatus, InventorySales, Reports, ShopSales};
pub use restock::{Restock, RestockOutcome};
pub use session::{MemorySession, SessionStore, SqliteSession};
pub use shops::{NewInventory, NewShop, ShopAdmin};
pub use telemetry::init_tracing;

use chrono::{DateTime, Utc};
use emporium_core::Customer;
use emporium_db::Database;
use std::sync::Arc;
use tracing::info;

// =============================================================================
// Engine Context
// =============================================================================

/// Everything an engine component needs. Cheap to clone.
#[derive(Clone)]
pub struct EngineContext {
    pub db: Database,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<EngineConfig>,
}

impl EngineContext {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Facade
// =============================================================================

/// Entry point for the HTTP layer.
#[derive(Debug, Clone)]
pub struct Emporium {
    ctx: EngineContext,
}

impl Emporium {
    /// Validates `config`, opens the database and runs migrations.
    pub async fn open(config: EngineConfig, identity: Arc<dyn IdentityProvider>) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.database.db_config()).await?;

        info!(path = %config.database.path.display(), "Emporium engine ready");

        Ok(Emporium {
            ctx: EngineContext {
                db,
                identity,
                clock: Arc::new(SystemClock),
                config: Arc::new(config),
            },
        })
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ctx.clock = clock;
        self
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn db(&self) -> &Database {
        &self.ctx.db
    }

    pub fn customers(&self) -> CustomerResolver {
        CustomerResolver::new(self.ctx.clone())
    }

    /// The web cart of `customer`, kept in their InCart order at the Online shop.
    pub fn web_cart(&self, customer: Customer) -> WebCart {
        WebCart::new(self.ctx.clone(), customer)
    }

    /// The POS cart of one physical shop, kept in `session`.
    pub fn pos_cart(&self, shop_id: impl Into<String>, session: Arc<dyn SessionStore>) -> PosCart {
        PosCart::new(self.ctx.clone(), shop_id, session)
    }

    pub fn checkout(&self) -> Checkout {
        Checkout::new(self.ctx.clone())
    }

    pub fn restock(&self) -> Restock {
        Restock::new(self.ctx.clone())
    }

    pub fn shops(&self) -> ShopAdmin {
        ShopAdmin::new(self.ctx.clone())
    }

    pub fn reports(&self) -> Reports {
        Reports::new(self.ctx.clone())
    }

    /// A database-backed session using the configured lifetime.
    pub fn session(&self, session_id: impl Into<String>) -> SqliteSession {
        let ttl = chrono::Duration::seconds(self.ctx.config.session.ttl_secs as i64);
        SqliteSession::new(&self.ctx.db, session_id, ttl, self.ctx.clock.clone())
    }

    /// Deletes expired session values. Returns how many were removed.
    pub async fn purge_sessions(&self) -> EngineResult<u64> {
        let removed = self.ctx.db.sessions().purge_expired(self.ctx.now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired session values");
        }
        Ok(removed)
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! A seeded in-memory engine for the scenario tests.

    use super::*;
    use chrono::TimeZone;
    use emporium_core::{Inventory, Item, LocationKind, Shop};
    use uuid::Uuid;

    pub struct Harness {
        pub engine: Emporium,
        pub identity: Arc<MemoryIdentityProvider>,
        pub clock: Arc<FixedClock>,
        pub online: Shop,
        pub physical: Shop,
    }

    pub async fn harness() -> Harness {
        harness_with(EngineConfig::in_memory()).await
    }

    pub async fn harness_with(config: EngineConfig) -> Harness {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()));
        let engine = Emporium::open(config, identity.clone())
            .await
            .unwrap()
            .with_clock(clock.clone());

        let online = shop("Emporium Online", LocationKind::Online);
        let physical = shop("High Street", LocationKind::Physical);
        engine.db().shops().insert(&online).await.unwrap();
        engine.db().shops().insert(&physical).await.unwrap();

        Harness {
            engine,
            identity,
            clock,
            online,
            physical,
        }
    }

    pub fn shop(name: &str, kind: LocationKind) -> Shop {
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

    impl Harness {
        /// Adds an item and stocks it at `shop`.
        pub async fn stock(&self, shop: &Shop, name: &str, quantity: i64, sell_cents: i64, buy_cents: i64) -> Inventory {
            let now = Utc::now();
            let item = Item {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                buy_price_cents: buy_cents,
                production_date: None,
                description: None,
                categories: Vec::new(),
                created_at: now,
            };
            self.engine.db().items().insert(&item).await.unwrap();

            let inventory = Inventory {
                id: Uuid::new_v4().to_string(),
                shop_id: shop.id.clone(),
                item_id: item.id.clone(),
                quantity,
                sell_price_cents: sell_cents,
                created_at: now,
                updated_at: now,
            };
            self.engine.db().inventory().insert(&inventory).await.unwrap();
            inventory
        }

        pub async fn quantity(&self, inventory_id: &str) -> i64 {
            self.engine
                .db()
                .inventory()
                .get_by_id(inventory_id)
                .await
                .unwrap()
                .unwrap()
                .quantity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::harness;
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let h = harness().await;
        assert!(h.engine.db().health_check().await);
        assert_eq!(h.engine.context().now(), h.clock.now());
    }

    #[tokio::test]
    async fn test_purge_sessions_drops_expired_values() {
        let h = harness().await;
        let session = h.engine.session("browser-9");
        session.set("guest_customer_id", b"c-1".to_vec()).await.unwrap();

        assert_eq!(h.engine.purge_sessions().await.unwrap(), 0);
        h.clock.advance(chrono::Duration::days(2));
        assert_eq!(h.engine.purge_sessions().await.unwrap(), 1);
    }
}
