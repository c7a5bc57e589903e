use chrono::NaiveDate;

use crate::config::ExpiryConfig;
use crate::model::{StockAssessment, StockStatus};

/// Months are approximated as 30 days.
const DAYS_PER_MONTH: f64 = 30.0;

/// Classify a scan's stock health from its condition and expiry.
///
/// First match wins: damage overrides everything, a missing expiry is
/// `NO_EXPIRY`, then expired / near / short / good by days left relative to
/// `today`.
pub fn classify_stock(
    condition: &str,
    expiry: Option<NaiveDate>,
    thresholds: &ExpiryConfig,
    today: NaiveDate,
) -> StockAssessment {
    if condition.trim().eq_ignore_ascii_case("damage") {
        return assessment(StockStatus::Damage, None);
    }

    let Some(expiry) = expiry else {
        return assessment(StockStatus::NoExpiry, None);
    };

    let days_left = (expiry - today).num_days();
    let months_left = days_left as f64 / DAYS_PER_MONTH;

    let status = if days_left < 0 {
        StockStatus::Expired
    } else if months_left <= thresholds.near_expiry_months as f64 {
        StockStatus::NearExpiry
    } else if months_left <= thresholds.short_expiry_months as f64 {
        StockStatus::ShortExpiry
    } else {
        StockStatus::GoodStock
    };

    assessment(status, Some(days_left))
}

fn assessment(status: StockStatus, days_left: Option<i64>) -> StockAssessment {
    StockAssessment {
        status,
        priority: status.priority(),
        days_left,
    }
}
