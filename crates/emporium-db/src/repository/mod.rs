//! # Repository Module
//!
//! Per-table queries for Emporium.
//!
//! ## Two Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Free functions taking `&mut SqliteConnection`                         │
//! │  ├── inventory::decrement_stock(&mut *tx, id, qty)                     │
//! │  ├── order::finalize_order(&mut *tx, id, now)                          │
//! │  └── ...  composable inside one transaction                            │
//! │       ▲                                                                 │
//! │       │ acquire a pooled connection and delegate                       │
//! │       │                                                                 │
//! │  Repository structs holding the pool                                   │
//! │  ├── db.shops().get_by_id(id)                                          │
//! │  ├── db.orders().recent_orders(customer, 3)                            │
//! │  └── ...  one-shot reads and writes                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status-guarded writes (`WHERE status = 'in_cart'`,
//! `WHERE quantity >= ?`) report a lost race as [`DbError::Conflict`]
//! rather than silently doing nothing.
//!
//! [`DbError::Conflict`]: crate::DbError::Conflict

pub mod customer;
pub mod inventory;
pub mod item;
pub mod order;
pub mod session;
pub mod shop;

#[cfg(test)]
pub(crate) mod fixtures {
    //! Rows shared by the repository tests.

    use chrono::Utc;
    use emporium_core::{Customer, Inventory, Item, LocationKind, Order, OrderStatus, Shop};
    use uuid::Uuid;

    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
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

    pub fn item(name: &str, buy_price_cents: i64) -> Item {
        Item {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            buy_price_cents,
            production_date: None,
            description: None,
            categories: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn inventory(shop: &Shop, item: &Item, quantity: i64, sell_price_cents: i64) -> Inventory {
        let now = Utc::now();
        Inventory {
            id: Uuid::new_v4().to_string(),
            shop_id: shop.id.clone(),
            item_id: item.id.clone(),
            quantity,
            sell_price_cents,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn customer(user_id: Option<&str>) -> Customer {
        Customer {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            is_guest: user_id.is_none(),
            email_confirmed: false,
            created_at: Utc::now(),
        }
    }

    pub fn cart(customer: &Customer, shop: &Shop) -> Order {
        Order {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            shop_id: shop.id.clone(),
            status: OrderStatus::InCart,
            order_date: None,
            created_at: Utc::now(),
        }
    }
}
