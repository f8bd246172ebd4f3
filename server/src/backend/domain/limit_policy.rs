//! Purchase eligibility rules.
//!
//! Everything here is a pure function of the configured limits, the usage
//! counters for the current windows and the prospective amount. Evaluation
//! fails closed: any amount that cannot be proven to fit inside both limits
//! is denied.

use shared::{SpendingLimit, SpendingStatus};
use thiserror::Error;

use super::money::{has_cent_precision, round_cents};

/// Spend accumulated in the current local day and month
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UsageSnapshot {
    pub daily_spent: f64,
    pub monthly_spent: f64,
}

/// Why a purchase was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PurchaseDenial {
    #[error("Purchase amount must be a positive amount with at most two decimal places")]
    InvalidAmount,

    #[error("Purchase amount {amount:.2} is larger than the {period} limit of {limit:.2}")]
    AmountAboveLimit {
        amount: f64,
        limit: f64,
        period: &'static str,
    },

    #[error("Daily limit exceeded: {spent:.2} already spent of {limit:.2}, purchase of {amount:.2} not allowed")]
    DailyLimitExceeded { spent: f64, limit: f64, amount: f64 },

    #[error("Monthly limit exceeded: {spent:.2} already spent of {limit:.2}, purchase of {amount:.2} not allowed")]
    MonthlyLimitExceeded { spent: f64, limit: f64, amount: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseDecision {
    pub allowed: bool,
    pub denial: Option<PurchaseDenial>,
}

impl PurchaseDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            denial: None,
        }
    }

    fn deny(denial: PurchaseDenial) -> Self {
        Self {
            allowed: false,
            denial: Some(denial),
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.denial.as_ref().map(|d| d.to_string())
    }
}

pub fn evaluate_purchase(limit: &SpendingLimit, usage: &UsageSnapshot, amount: f64) -> PurchaseDecision {
    if !(amount.is_finite() && amount > 0.0 && has_cent_precision(amount)) {
        return PurchaseDecision::deny(PurchaseDenial::InvalidAmount);
    }

    // An amount no window could ever hold is refused outright, whatever the usage
    if amount > limit.daily_limit {
        return PurchaseDecision::deny(PurchaseDenial::AmountAboveLimit {
            amount,
            limit: limit.daily_limit,
            period: "daily",
        });
    }
    if amount > limit.monthly_limit {
        return PurchaseDecision::deny(PurchaseDenial::AmountAboveLimit {
            amount,
            limit: limit.monthly_limit,
            period: "monthly",
        });
    }

    if round_cents(usage.daily_spent + amount) > limit.daily_limit {
        return PurchaseDecision::deny(PurchaseDenial::DailyLimitExceeded {
            spent: usage.daily_spent,
            limit: limit.daily_limit,
            amount,
        });
    }
    if round_cents(usage.monthly_spent + amount) > limit.monthly_limit {
        return PurchaseDecision::deny(PurchaseDenial::MonthlyLimitExceeded {
            spent: usage.monthly_spent,
            limit: limit.monthly_limit,
            amount,
        });
    }

    PurchaseDecision::allow()
}

/// Usage as a display percentage, clamped to [0, 100]
pub fn usage_percentage(spent: f64, limit: f64) -> f64 {
    if !(limit.is_finite() && limit > 0.0) {
        return 100.0;
    }
    let percentage = spent / limit * 100.0;
    if percentage.is_nan() {
        return 0.0;
    }
    percentage.clamp(0.0, 100.0)
}

pub fn spending_status(limit: &SpendingLimit, usage: &UsageSnapshot) -> SpendingStatus {
    SpendingStatus {
        daily_spent: round_cents(usage.daily_spent),
        daily_limit: limit.daily_limit,
        daily_percentage: usage_percentage(usage.daily_spent, limit.daily_limit),
        monthly_spent: round_cents(usage.monthly_spent),
        monthly_limit: limit.monthly_limit,
        monthly_percentage: usage_percentage(usage.monthly_spent, limit.monthly_limit),
    }
}

/// True when moving from `before` to `after` spend crosses `threshold_percent`
pub fn crosses_threshold(before: f64, after: f64, limit: f64, threshold_percent: f64) -> bool {
    usage_percentage(before, limit) < threshold_percent && usage_percentage(after, limit) >= threshold_percent
}
