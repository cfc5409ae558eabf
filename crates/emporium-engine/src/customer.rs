//! # Customer Resolution
//!
//! Maps whoever is buying to a `customers` row.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Signed-in user ──► find by user_id ──► (none) create registered row   │
//! │                                                                         │
//! │  POS selection  ──► Customer(id) ──► find by id ──┐                    │
//! │                     User(user_id) ──► as above    ├─► (none) new guest │
//! │                     Guest ────────────────────────┘                    │
//! │                                                                         │
//! │  Anonymous      ──► session["guest_customer_id"] ──► (none) new guest  │
//! │                                                     cached in session  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Guests never earn points and always pay full price.

use chrono::{DateTime, Utc};
use emporium_core::{Customer, DiscountRate, LoyaltySchedule, Money, Tier};
use emporium_db::repository::customer;
use emporium_db::{DbError, SqliteConnection};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::checkout::PosCustomer;
use crate::error::{EngineError, EngineResult};
use crate::identity::IdentityProvider;
use crate::session::{SessionStore, GUEST_CUSTOMER_KEY};
use crate::EngineContext;

// =============================================================================
// Connection-level resolution
// =============================================================================

fn new_customer(user_id: Option<&str>, email_confirmed: bool, now: DateTime<Utc>) -> Customer {
    Customer {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.map(str::to_string),
        is_guest: user_id.is_none(),
        email_confirmed,
        created_at: now,
    }
}

/// Inserts a fresh guest.
pub async fn create_guest(conn: &mut SqliteConnection, now: DateTime<Utc>) -> EngineResult<Customer> {
    let guest = new_customer(None, false, now);
    customer::insert_customer(conn, &guest).await?;
    debug!(id = %guest.id, "Guest customer created");
    Ok(guest)
}

/// The registered customer of `user_id`, created on first use.
///
/// The email-confirmed flag is refreshed from the identity provider on
/// every call.
pub async fn registered_customer(
    conn: &mut SqliteConnection,
    identity: &dyn IdentityProvider,
    user_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<Customer> {
    let confirmed = identity.email_confirmed(user_id).await?;

    if let Some(mut existing) = customer::find_by_user_id(conn, user_id).await? {
        if existing.email_confirmed != confirmed {
            customer::set_email_confirmed(conn, &existing.id, confirmed).await?;
            existing.email_confirmed = confirmed;
        }
        return Ok(existing);
    }

    let created = new_customer(Some(user_id), confirmed, now);
    match customer::insert_customer(conn, &created).await {
        Ok(()) => {
            info!(id = %created.id, user_id = %user_id, "Customer created");
            Ok(created)
        }
        // Another request created it first
        Err(DbError::UniqueViolation { .. }) => customer::find_by_user_id(conn, user_id)
            .await?
            .ok_or_else(|| EngineError::Conflict(format!("customer for user {user_id}"))),
        Err(e) => Err(e.into()),
    }
}

/// The paying customer chosen at the till. Unknown ids fall back to a
/// fresh guest.
pub async fn resolve_pos_customer(
    conn: &mut SqliteConnection,
    identity: &dyn IdentityProvider,
    selection: &PosCustomer,
    now: DateTime<Utc>,
) -> EngineResult<Customer> {
    match selection {
        PosCustomer::Guest => create_guest(conn, now).await,
        PosCustomer::Customer(id) => match customer::get_customer(conn, id).await? {
            Some(found) => Ok(found),
            None => {
                warn!(customer_id = %id, "Selected customer not found, checking out as guest");
                create_guest(conn, now).await
            }
        },
        PosCustomer::User(user_id) => {
            if identity.user_exists(user_id).await? {
                registered_customer(conn, identity, user_id, now).await
            } else {
                warn!(user_id = %user_id, "Selected user not found, checking out as guest");
                create_guest(conn, now).await
            }
        }
    }
}

/// The discount a customer gets right now.
///
/// Zero for guests and unconfirmed identities.
pub async fn discount_rate_for(
    identity: &dyn IdentityProvider,
    schedule: &LoyaltySchedule,
    customer: &Customer,
) -> EngineResult<DiscountRate> {
    let Some(user_id) = customer.identity() else {
        return Ok(DiscountRate::zero());
    };
    if !identity.email_confirmed(user_id).await? {
        return Ok(DiscountRate::zero());
    }
    let points = identity.account_points(user_id).await?;
    Ok(schedule.discount_rate(points))
}

/// Credits points for a paid total. Runs after commit, so a failure is
/// logged and reported as 0 points rather than undoing the sale.
pub async fn award_points(
    identity: &dyn IdentityProvider,
    schedule: &LoyaltySchedule,
    customer: &Customer,
    total_paid: Money,
) -> i64 {
    let Some(user_id) = customer.identity() else {
        return 0;
    };

    let earned = schedule.points_earned(total_paid);
    if earned <= 0 {
        return 0;
    }

    match identity.email_confirmed(user_id).await {
        Ok(true) => {}
        Ok(false) => return 0,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Could not check email confirmation, no points awarded");
            return 0;
        }
    }

    match identity.add_points(user_id, earned).await {
        Ok(()) => {
            info!(user_id = %user_id, points = earned, "Loyalty points awarded");
            earned
        }
        Err(e) => {
            warn!(user_id = %user_id, points = earned, error = %e, "Failed to award loyalty points");
            0
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Loyalty standing shown in the POS customer picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountPreview {
    pub user_id: String,
    pub points: i64,
    pub tier: Tier,
    pub discount_bps: u32,
    /// False when the email is unconfirmed; the rate then does not apply.
    pub eligible: bool,
}

#[derive(Debug, Clone)]
pub struct CustomerResolver {
    ctx: EngineContext,
}

impl CustomerResolver {
    pub fn new(ctx: EngineContext) -> Self {
        CustomerResolver { ctx }
    }

    pub async fn get(&self, customer_id: &str) -> EngineResult<Customer> {
        self.ctx
            .db
            .customers()
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Customer", customer_id))
    }

    /// The registered customer of `user_id`, created on first use.
    pub async fn for_user(&self, user_id: &str) -> EngineResult<Customer> {
        let mut conn = self.ctx.db.acquire().await?;
        registered_customer(&mut *conn, &*self.ctx.identity, user_id, self.ctx.now()).await
    }

    /// The signed-in user's customer, or the session's guest.
    pub async fn current(&self, session: &dyn SessionStore) -> EngineResult<Customer> {
        match self.ctx.identity.current_user_id().await? {
            Some(user_id) => self.for_user(&user_id).await,
            None => self.guest(session).await,
        }
    }

    /// The guest cached in `session`, created and cached on first use.
    pub async fn guest(&self, session: &dyn SessionStore) -> EngineResult<Customer> {
        if let Some(raw) = session.get(GUEST_CUSTOMER_KEY).await? {
            match String::from_utf8(raw) {
                Ok(id) => {
                    if let Some(found) = self.ctx.db.customers().get_by_id(&id).await? {
                        if found.is_guest {
                            return Ok(found);
                        }
                    }
                    debug!(customer_id = %id, "Cached guest no longer usable");
                }
                Err(_) => warn!("Discarding malformed guest id in session"),
            }
        }

        let guest = {
            let mut conn = self.ctx.db.acquire().await?;
            create_guest(&mut *conn, self.ctx.now()).await?
        };
        session
            .set(GUEST_CUSTOMER_KEY, guest.id.as_bytes().to_vec())
            .await?;
        Ok(guest)
    }

    /// Points, tier and rate for a user, before checkout.
    pub async fn discount_preview(&self, user_id: &str) -> EngineResult<DiscountPreview> {
        let identity = &*self.ctx.identity;
        let schedule = &self.ctx.config.loyalty;

        let points = identity.account_points(user_id).await?;
        let eligible = identity.email_confirmed(user_id).await?;
        let rate = if eligible {
            schedule.discount_rate(points)
        } else {
            DiscountRate::zero()
        };

        Ok(DiscountPreview {
            user_id: user_id.to_string(),
            points,
            tier: schedule.tier_for(points),
            discount_bps: rate.bps(),
            eligible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use crate::testing::harness;

    #[tokio::test]
    async fn test_registered_customer_created_once() {
        let h = harness().await;
        h.identity.add_user("u-1", 0, false).await;
        let resolver = h.engine.customers();

        let first = resolver.for_user("u-1").await.unwrap();
        assert!(!first.is_guest);
        assert!(!first.email_confirmed);

        h.identity.confirm_email("u-1").await;
        let second = resolver.for_user("u-1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.email_confirmed);
    }

    #[tokio::test]
    async fn test_guest_cached_in_session() {
        let h = harness().await;
        let session = MemorySession::new();
        let resolver = h.engine.customers();

        let guest = resolver.current(&session).await.unwrap();
        assert!(guest.is_guest);
        assert!(guest.user_id.is_none());

        let again = resolver.guest(&session).await.unwrap();
        assert_eq!(guest.id, again.id);

        let other = resolver.guest(&MemorySession::new()).await.unwrap();
        assert_ne!(guest.id, other.id);
    }

    #[tokio::test]
    async fn test_stale_guest_id_replaced() {
        let h = harness().await;
        let session = MemorySession::new();
        session.set(GUEST_CUSTOMER_KEY, b"gone".to_vec()).await.unwrap();

        let guest = h.engine.customers().guest(&session).await.unwrap();
        assert_ne!(guest.id, "gone");
        assert_eq!(
            session.get(GUEST_CUSTOMER_KEY).await.unwrap(),
            Some(guest.id.as_bytes().to_vec())
        );
    }

    #[tokio::test]
    async fn test_unknown_pos_customer_falls_back_to_guest() {
        let h = harness().await;
        let mut conn = h.engine.db().acquire().await.unwrap();
        let now = h.engine.context().now();

        let c = resolve_pos_customer(&mut *conn, &*h.identity, &PosCustomer::Customer("nope".into()), now)
            .await
            .unwrap();
        assert!(c.is_guest);
    }

    #[tokio::test]
    async fn test_discount_rate_requires_confirmed_email() {
        let h = harness().await;
        let schedule = LoyaltySchedule::default();
        h.identity.add_user("u-1", 150, false).await;
        let c = h.engine.customers().for_user("u-1").await.unwrap();

        let rate = discount_rate_for(&*h.identity, &schedule, &c).await.unwrap();
        assert!(rate.is_zero());

        h.identity.confirm_email("u-1").await;
        let rate = discount_rate_for(&*h.identity, &schedule, &c).await.unwrap();
        assert_eq!(rate.bps(), 1000);

        let preview = h.engine.customers().discount_preview("u-1").await.unwrap();
        assert_eq!(preview.tier, Tier::Gold);
        assert!(preview.eligible);
    }

    #[tokio::test]
    async fn test_guests_earn_nothing() {
        let h = harness().await;
        let guest = h.engine.customers().guest(&MemorySession::new()).await.unwrap();
        let earned = award_points(
            &*h.identity,
            &LoyaltySchedule::default(),
            &guest,
            Money::from_cents(10_000),
        )
        .await;
        assert_eq!(earned, 0);
    }
}
