//! Usage logging and billing-cycle types

mod entity;

pub use entity::{
    LimitCheck, LimitSeverity, ModelUsage, MonthlySummary, SystemUsageStats, TopUsageEntry,
    UsageLogEntry, UsageLogId,
};

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// First day of the billing cycle containing the given instant
pub fn current_cycle_start(now: DateTime<Utc>) -> NaiveDate {
    let date = now.date_naive();
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cycle_start_mid_month() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        assert_eq!(
            current_cycle_start(now),
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
        );
    }

    #[test]
    fn test_cycle_start_first_day() {
        let now = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        assert_eq!(
            current_cycle_start(now),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
        );
    }
}
