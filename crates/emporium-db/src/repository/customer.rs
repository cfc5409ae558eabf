//! # Customer Repository
//!
//! Registered customers (one per user identity) and guests.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporium_core::Customer;

const CUSTOMER_COLUMNS: &str = "id, user_id, is_guest, email_confirmed, created_at";

// =============================================================================
// Connection-level queries
// =============================================================================

pub async fn insert_customer(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
    debug!(id = %customer.id, is_guest = customer.is_guest, "Inserting customer");

    sqlx::query(
        r#"
        INSERT INTO customers (id, user_id, is_guest, email_confirmed, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.user_id)
    .bind(customer.is_guest)
    .bind(customer.email_confirmed)
    .bind(customer.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer =
        sqlx::query_as::<_, Customer>(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(customer)
}

/// The registered customer linked to `user_id`.
pub async fn find_by_user_id(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE user_id = ?1 AND is_guest = 0"
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

pub async fn set_email_confirmed(conn: &mut SqliteConnection, id: &str, confirmed: bool) -> DbResult<()> {
    let result = sqlx::query("UPDATE customers SET email_confirmed = ?2 WHERE id = ?1")
        .bind(id)
        .bind(confirmed)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_customer(&mut *conn, customer).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        get_customer(&mut *conn, id).await
    }

    pub async fn find_by_user_id(&self, user_id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        find_by_user_id(&mut *conn, user_id).await
    }

    pub async fn set_email_confirmed(&self, id: &str, confirmed: bool) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_email_confirmed(&mut *conn, id, confirmed).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_registered_and_guest() {
        let db = fixtures::db().await;
        let member = fixtures::customer(Some("user-1"));
        let guest = fixtures::customer(None);
        db.customers().insert(&member).await.unwrap();
        db.customers().insert(&guest).await.unwrap();

        let found = db.customers().find_by_user_id("user-1").await.unwrap().unwrap();
        assert_eq!(found.id, member.id);
        assert!(!found.is_guest);

        let loaded_guest = db.customers().get_by_id(&guest.id).await.unwrap().unwrap();
        assert!(loaded_guest.is_guest);
        assert!(loaded_guest.identity().is_none());
    }

    #[tokio::test]
    async fn test_one_customer_per_user() {
        let db = fixtures::db().await;
        db.customers()
            .insert(&fixtures::customer(Some("user-1")))
            .await
            .unwrap();
        let err = db
            .customers()
            .insert(&fixtures::customer(Some("user-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_guest_with_identity_rejected() {
        let db = fixtures::db().await;
        let mut bad = fixtures::customer(Some("user-2"));
        bad.is_guest = true;
        let err = db.customers().insert(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_set_email_confirmed() {
        let db = fixtures::db().await;
        let member = fixtures::customer(Some("user-3"));
        db.customers().insert(&member).await.unwrap();

        db.customers().set_email_confirmed(&member.id, true).await.unwrap();
        let loaded = db.customers().get_by_id(&member.id).await.unwrap().unwrap();
        assert!(loaded.email_confirmed);
    }
}
