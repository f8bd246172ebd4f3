//! Helpers for the two-decimal money convention.

/// Round to whole cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// True when the amount has at most two decimal places
pub fn has_cent_precision(amount: f64) -> bool {
    if !amount.is_finite() {
        return false;
    }
    let cents = amount * 100.0;
    (cents - cents.round()).abs() < 1e-6
}

pub fn format_amount(amount: f64) -> String {
    format!("${:.2}", amount)
}
