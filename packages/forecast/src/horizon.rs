//! Forecast horizon selection.

use chrono::NaiveDate;
use crime_forecast_forecast_models::DailySeries;

/// Horizon used when the held-out window does not determine one.
pub const DEFAULT_HORIZON_DAYS: u32 = 30;

/// Number of calendar days from `train_end` to the last held-out date.
///
/// Falls back to `fallback` when there is no held-out data or the last
/// held-out date is not after `train_end`. The result counts days, not
/// rows, so sparse held-out windows are still covered to their end.
#[must_use]
pub fn test_horizon(train_end: NaiveDate, test: &DailySeries, fallback: u32) -> u32 {
    let Some(last) = test.last_date() else {
        log::debug!("No held-out data; using fallback horizon of {fallback} days");
        return fallback;
    };

    let days = (last - train_end).num_days();
    if days < 1 {
        log::warn!("Computed horizon {days} is not positive; using fallback of {fallback} days");
        return fallback;
    }

    u32::try_from(days).unwrap_or(u32::MAX)
}
