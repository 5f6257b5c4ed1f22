use chrono::{Datelike, NaiveDate};

use crate::model::{Owner, QuotaSummary};

/// First day of the calendar quarter containing `date`.
pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// Whether the owner's counter belongs to a quarter before the one containing `today`.
pub fn period_is_stale(owner: &Owner, today: NaiveDate) -> bool {
    owner.quota_period_start < quarter_start(today)
}

/// Nights counted against the current quarter. A stale counter counts as zero.
pub fn nights_used(owner: &Owner, today: NaiveDate) -> u32 {
    if period_is_stale(owner, today) {
        0
    } else {
        owner.nights_used
    }
}

pub fn summary(owner: &Owner, allowance: u32, today: NaiveDate) -> QuotaSummary {
    let used = nights_used(owner, today);
    let period_start = if period_is_stale(owner, today) {
        quarter_start(today)
    } else {
        owner.quota_period_start
    };
    QuotaSummary {
        nights_used: used,
        nights_remaining: allowance.saturating_sub(used),
        period_start,
    }
}
