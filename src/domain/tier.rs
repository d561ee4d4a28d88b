//! Subscription tier to monthly limit mapping
//!
//! Represented as injectable data rather than logic so new tiers are a data
//! change. An unknown tier always falls back to the free-tier limit, never to
//! unlimited.

use std::collections::HashMap;

/// Monthly limit assigned to a tier, in micro-dollars. None = unlimited.
pub type TierLimit = Option<i64>;

/// Mapping from subscription tier name to its default monthly limit
#[derive(Debug, Clone)]
pub struct TierLimits {
    limits: HashMap<String, TierLimit>,
    /// Limit applied to unknown or absent tiers
    fallback_micros: i64,
}

const USD: i64 = 1_000_000;

impl Default for TierLimits {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert("free".to_string(), Some(10 * USD));
        limits.insert("standard".to_string(), Some(50 * USD));
        limits.insert("micro".to_string(), Some(100 * USD));
        limits.insert("operator".to_string(), Some(250 * USD));
        limits.insert("enterprise".to_string(), Some(500 * USD));
        limits.insert("beta".to_string(), Some(1000 * USD));
        limits.insert("admin".to_string(), None);

        Self {
            limits,
            fallback_micros: 10 * USD,
        }
    }
}

impl TierLimits {
    /// Build a mapping from explicit data
    pub fn new(limits: HashMap<String, TierLimit>, fallback_micros: i64) -> Self {
        Self {
            limits,
            fallback_micros,
        }
    }

    /// Add or override a tier
    pub fn with_tier(mut self, tier: impl Into<String>, limit: TierLimit) -> Self {
        self.limits.insert(tier.into(), limit);
        self
    }

    /// Resolve the monthly limit for a tier. None = unlimited.
    ///
    /// Unknown tiers resolve to the fallback limit.
    pub fn monthly_limit_micros(&self, tier: &str) -> TierLimit {
        match self.limits.get(tier) {
            Some(limit) => *limit,
            None => Some(self.fallback_micros),
        }
    }

    /// Known tier names
    pub fn tiers(&self) -> impl Iterator<Item = &str> {
        self.limits.keys().map(String::as_str)
    }
}
