//! # Shop Repository
//!
//! Shops and the single online shop.
//!
//! The "at most one online shop" rule is enforced twice: the engine checks
//! [`find_online_shop`] first, and the partial unique index
//! `idx_shops_single_online` rejects a concurrent second insert.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporium_core::Shop;

const SHOP_COLUMNS: &str = "id, name, contact_number, location_kind, address, owner_id, created_at, updated_at";

// =============================================================================
// Connection-level queries
// =============================================================================

pub async fn insert_shop(conn: &mut SqliteConnection, shop: &Shop) -> DbResult<()> {
    debug!(id = %shop.id, kind = %shop.location_kind, "Inserting shop");

    sqlx::query(
        r#"
        INSERT INTO shops (
            id, name, contact_number, location_kind,
            address, owner_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&shop.id)
    .bind(&shop.name)
    .bind(&shop.contact_number)
    .bind(shop.location_kind)
    .bind(&shop.address)
    .bind(&shop.owner_id)
    .bind(shop.created_at)
    .bind(shop.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_shop(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Shop>> {
    let shop = sqlx::query_as::<_, Shop>(&format!("SELECT {SHOP_COLUMNS} FROM shops WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(shop)
}

/// The online shop, if one has been created.
pub async fn find_online_shop(conn: &mut SqliteConnection) -> DbResult<Option<Shop>> {
    let shop = sqlx::query_as::<_, Shop>(&format!(
        "SELECT {SHOP_COLUMNS} FROM shops WHERE location_kind = 'online' LIMIT 1"
    ))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(shop)
}

pub async fn list_shops(conn: &mut SqliteConnection) -> DbResult<Vec<Shop>> {
    let shops = sqlx::query_as::<_, Shop>(&format!("SELECT {SHOP_COLUMNS} FROM shops ORDER BY name, id"))
        .fetch_all(&mut *conn)
        .await?;

    Ok(shops)
}

/// Overwrites every mutable column of an existing shop.
pub async fn update_shop(conn: &mut SqliteConnection, shop: &Shop) -> DbResult<()> {
    debug!(id = %shop.id, "Updating shop");

    let result = sqlx::query(
        r#"
        UPDATE shops SET
            name = ?2,
            contact_number = ?3,
            location_kind = ?4,
            address = ?5,
            owner_id = ?6,
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(&shop.id)
    .bind(&shop.name)
    .bind(&shop.contact_number)
    .bind(shop.location_kind)
    .bind(&shop.address)
    .bind(&shop.owner_id)
    .bind(shop.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Shop", &shop.id));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shop database operations.
#[derive(Debug, Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShopRepository { pool }
    }

    pub async fn insert(&self, shop: &Shop) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_shop(&mut *conn, shop).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shop>> {
        let mut conn = self.pool.acquire().await?;
        get_shop(&mut *conn, id).await
    }

    pub async fn online_shop(&self) -> DbResult<Option<Shop>> {
        let mut conn = self.pool.acquire().await?;
        find_online_shop(&mut *conn).await
    }

    pub async fn list(&self) -> DbResult<Vec<Shop>> {
        let mut conn = self.pool.acquire().await?;
        list_shops(&mut *conn).await
    }

    pub async fn update(&self, shop: &Shop) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_shop(&mut *conn, shop).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use emporium_core::LocationKind;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = fixtures::db().await;
        let mut shop = fixtures::shop("Downtown", LocationKind::Physical);
        shop.owner_id = Some("user-7".to_string());
        db.shops().insert(&shop).await.unwrap();

        let loaded = db.shops().get_by_id(&shop.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Downtown");
        assert_eq!(loaded.location_kind, LocationKind::Physical);
        assert!(loaded.is_owned_by("user-7"));
        assert!(db.shops().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_online_shop_rejected_by_index() {
        let db = fixtures::db().await;
        db.shops()
            .insert(&fixtures::shop("Web", LocationKind::Online))
            .await
            .unwrap();

        let err = db
            .shops()
            .insert(&fixtures::shop("Web 2", LocationKind::Online))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // any number of physical shops
        db.shops()
            .insert(&fixtures::shop("A", LocationKind::Physical))
            .await
            .unwrap();
        db.shops()
            .insert(&fixtures::shop("B", LocationKind::Physical))
            .await
            .unwrap();
        assert_eq!(db.shops().list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_online_shop() {
        let db = fixtures::db().await;
        assert!(db.shops().online_shop().await.unwrap().is_none());

        let web = fixtures::shop("Web", LocationKind::Online);
        db.shops().insert(&web).await.unwrap();
        db.shops()
            .insert(&fixtures::shop("Mall", LocationKind::Physical))
            .await
            .unwrap();

        assert_eq!(db.shops().online_shop().await.unwrap().unwrap().id, web.id);
    }

    #[tokio::test]
    async fn test_update_missing_shop() {
        let db = fixtures::db().await;
        let shop = fixtures::shop("Ghost", LocationKind::Physical);
        let err = db.shops().update(&shop).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
