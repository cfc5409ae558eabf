//! # Loyalty Tiers
//!
//! Maps a customer's point balance to a status tier and a discount rate.
//!
//! ## Default Schedule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Tier        Min points     Discount                                   │
//! │   ─────────   ──────────     ────────                                   │
//! │   Unranked         0            0%                                      │
//! │   Bronze          50            0%                                      │
//! │   Silver         100            5%                                      │
//! │   Gold           150           10%                                      │
//! │   Platinum       300           15%                                      │
//! │                                                                         │
//! │   Highest tier whose minimum is ≤ points wins.                          │
//! │   Points accrue at floor(total paid × 10).                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Thresholds and rates are configuration, loaded with the engine config.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::DiscountRate;
use crate::POINTS_PER_DOLLAR;

// =============================================================================
// Tier
// =============================================================================

/// Loyalty status, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Unranked,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Unranked => "Unranked",
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One rung of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierThreshold {
    pub tier: Tier,
    pub min_points: i64,
    pub discount_bps: u32,
}

impl TierThreshold {
    pub const fn new(tier: Tier, min_points: i64, discount_bps: u32) -> Self {
        TierThreshold {
            tier,
            min_points,
            discount_bps,
        }
    }

    #[inline]
    pub fn rate(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }
}

// =============================================================================
// Schedule
// =============================================================================

/// The configured tier ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltySchedule {
    #[serde(default = "default_thresholds")]
    pub tiers: Vec<TierThreshold>,

    #[serde(default = "default_points_per_dollar")]
    pub points_per_dollar: i64,
}

fn default_thresholds() -> Vec<TierThreshold> {
    vec![
        TierThreshold::new(Tier::Bronze, 50, 0),
        TierThreshold::new(Tier::Silver, 100, 500),
        TierThreshold::new(Tier::Gold, 150, 1000),
        TierThreshold::new(Tier::Platinum, 300, 1500),
    ]
}

fn default_points_per_dollar() -> i64 {
    POINTS_PER_DOLLAR
}

impl Default for LoyaltySchedule {
    fn default() -> Self {
        LoyaltySchedule {
            tiers: default_thresholds(),
            points_per_dollar: default_points_per_dollar(),
        }
    }
}

impl LoyaltySchedule {
    /// The highest threshold reached by `points`, if any.
    fn reached(&self, points: i64) -> Option<&TierThreshold> {
        // Later entries win ties, so an equal minimum resolves upward
        self.tiers
            .iter()
            .filter(|t| points >= t.min_points)
            .max_by(|a, b| a.min_points.cmp(&b.min_points).then(a.tier.cmp(&b.tier)))
    }

    /// Status tier for a point balance.
    pub fn tier_for(&self, points: i64) -> Tier {
        self.reached(points).map(|t| t.tier).unwrap_or(Tier::Unranked)
    }

    /// Discount rate for a point balance.
    pub fn discount_rate(&self, points: i64) -> DiscountRate {
        self.reached(points)
            .map(|t| t.rate())
            .unwrap_or_else(DiscountRate::zero)
    }

    /// `price × (1 − rate(points))`, rounded to the cent.
    pub fn apply_discount(&self, price: Money, points: i64) -> Money {
        price.apply_discount(self.discount_rate(points))
    }

    /// Points earned for a paid total.
    pub fn points_earned(&self, total_paid: Money) -> i64 {
        total_paid.points_at(self.points_per_dollar)
    }

    /// The next tier up and the points still needed to reach it.
    pub fn next_tier(&self, points: i64) -> Option<(Tier, i64)> {
        self.tiers
            .iter()
            .filter(|t| t.min_points > points)
            .min_by_key(|t| t.min_points)
            .map(|t| (t.tier, t.min_points - points))
    }

    /// Checks the ladder is usable.
    ///
    /// ## Rules
    /// - minimums are non-negative and strictly ascending with the tier
    /// - rates are below 100% and never decrease as the tier rises
    /// - accrual rate is non-negative
    pub fn validate(&self) -> ValidationResult<()> {
        let mut sorted: Vec<&TierThreshold> = self.tiers.iter().collect();
        sorted.sort_by_key(|t| t.tier);

        for pair in sorted.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if lower.tier == upper.tier {
                return Err(ValidationError::Duplicate {
                    field: "loyalty tier".to_string(),
                    value: upper.tier.to_string(),
                });
            }
            if upper.min_points <= lower.min_points {
                return Err(ValidationError::InvalidFormat {
                    field: "loyalty tiers".to_string(),
                    reason: format!("{} must need more points than {}", upper.tier, lower.tier),
                });
            }
            if upper.discount_bps < lower.discount_bps {
                return Err(ValidationError::InvalidFormat {
                    field: "loyalty tiers".to_string(),
                    reason: format!("{} must not discount less than {}", upper.tier, lower.tier),
                });
            }
        }

        for t in &self.tiers {
            if t.min_points < 0 {
                return Err(ValidationError::MustBePositive {
                    field: format!("{} min_points", t.tier),
                });
            }
            if t.discount_bps >= DiscountRate::MAX_BPS {
                return Err(ValidationError::OutOfRange {
                    field: format!("{} discount_bps", t.tier),
                    min: 0,
                    max: DiscountRate::MAX_BPS as i64 - 1,
                });
            }
        }

        if self.points_per_dollar < 0 {
            return Err(ValidationError::MustBePositive {
                field: "points_per_dollar".to_string(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
