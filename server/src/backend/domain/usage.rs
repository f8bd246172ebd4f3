//! Lazy daily/monthly usage windows.
//!
//! Counters are never stored or reset by a job. At read time the current
//! local day and month are derived from `now` and the configured offset, and
//! spend is summed from purchase history inside those windows.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use shared::PurchaseTransaction;

use super::limit_policy::UsageSnapshot;
use super::money::round_cents;
use crate::backend::storage::{format_timestamp, parse_timestamp};

/// Half-open UTC ranges `[start, end)` of the current local day and month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageWindows {
    pub day_start: DateTime<Utc>,
    pub day_end: DateTime<Utc>,
    pub month_start: DateTime<Utc>,
    pub month_end: DateTime<Utc>,
}

impl UsageWindows {
    pub fn at(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local_date = now.with_timezone(&offset).date_naive();
        let next_day = local_date.succ_opt().unwrap_or(local_date);

        let month_first = first_of_month(local_date.year(), local_date.month()).unwrap_or(local_date);
        let next_month_first = if local_date.month() == 12 {
            first_of_month(local_date.year() + 1, 1)
        } else {
            first_of_month(local_date.year(), local_date.month() + 1)
        }
        .unwrap_or(next_day);

        Self {
            day_start: local_midnight(local_date, offset),
            day_end: local_midnight(next_day, offset),
            month_start: local_midnight(month_first, offset),
            month_end: local_midnight(next_month_first, offset),
        }
    }

    pub fn contains_day(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.day_start && *at < self.day_end
    }

    pub fn contains_month(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.month_start && *at < self.month_end
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    // A fixed offset maps every local time to exactly one instant
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Sum purchase amounts that fall inside the windows. Purchases whose
/// timestamp cannot be read are ignored.
pub fn accumulate(purchases: &[PurchaseTransaction], windows: &UsageWindows) -> UsageSnapshot {
    let mut usage = UsageSnapshot::default();
    for purchase in purchases {
        let Some(at) = parse_timestamp(&purchase.created_at) else {
            continue;
        };
        if windows.contains_month(&at) {
            usage.monthly_spent += purchase.amount;
        }
        if windows.contains_day(&at) {
            usage.daily_spent += purchase.amount;
        }
    }
    usage.daily_spent = round_cents(usage.daily_spent);
    usage.monthly_spent = round_cents(usage.monthly_spent);
    usage
}

/// Storage-format bounds for the monthly window query
pub fn month_bounds(windows: &UsageWindows) -> (String, String) {
    (format_timestamp(windows.month_start), format_timestamp(windows.month_end))
}
