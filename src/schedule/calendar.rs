//! Exchange-local trading calendar.

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use tracing::debug;
use trading_calendar::Market;

/// Years for which exchange holidays are loaded.
const HOLIDAY_YEARS: std::ops::RangeInclusive<i32> = 2020..=2030;

/// Converts instants to exchange-local dates and counts trading days.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    tz: Tz,
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(tz: Tz, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            tz,
            holidays: holidays.into_iter().collect(),
        }
    }

    /// New York timezone with weekends only, no holidays.
    pub fn new_york() -> Self {
        Self::new(chrono_tz::America::New_York, [])
    }

    /// New York timezone with the NYSE holiday calendar.
    pub fn nyse() -> Result<Self> {
        Ok(Self::new(chrono_tz::America::New_York, nyse_holidays()?))
    }

    /// Add closures on top of the configured ones.
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Exchange-local calendar date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Exchange-local wall-clock time of an instant.
    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.tz).time()
    }

    /// Weekdays that are not configured holidays.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Number of trading days `d` with `from < d <= to`.
    ///
    /// Zero when `to` is not after `from`.
    pub fn trading_days_between(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        let mut count = 0;
        let mut day = from + Duration::days(1);
        while day <= to {
            if self.is_trading_day(day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        count
    }
}

/// Weekdays on which the NYSE is closed.
///
/// Years the exchange calendar does not cover contribute nothing.
pub fn nyse_holidays() -> Result<Vec<NaiveDate>> {
    let exchange = trading_calendar::TradingCalendar::new(Market::NYSE)
        .map_err(|e| anyhow::anyhow!("Failed to load NYSE calendar: {:?}", e))?;

    let mut holidays = Vec::new();
    for year in HOLIDAY_YEARS {
        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            continue;
        };
        let mut day = first;
        while day <= last {
            let weekday = !matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
            if weekday && matches!(exchange.is_trading_day(day), Ok(false)) {
                holidays.push(day);
            }
            day += Duration::days(1);
        }
    }
    debug!(count = holidays.len(), "Loaded NYSE holidays");
    Ok(holidays)
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::new_york()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekends_are_not_trading_days() {
        let cal = TradingCalendar::new_york();
        assert!(cal.is_trading_day(date(2025, 3, 7))); // Friday
        assert!(!cal.is_trading_day(date(2025, 3, 8)));
        assert!(!cal.is_trading_day(date(2025, 3, 9)));
        assert!(cal.is_trading_day(date(2025, 3, 10)));
    }

    #[test]
    fn test_holidays_are_skipped() {
        let cal = TradingCalendar::new(chrono_tz::America::New_York, [date(2025, 7, 4)]);
        assert!(!cal.is_trading_day(date(2025, 7, 4)));
        // Thu -> Mon spans a holiday Friday and a weekend
        assert_eq!(cal.trading_days_between(date(2025, 7, 3), date(2025, 7, 7)), 1);
    }

    #[test]
    fn test_nyse_calendar_closes_on_exchange_holidays() {
        let cal = TradingCalendar::nyse().unwrap();
        assert!(!cal.is_trading_day(date(2025, 7, 4)));
        assert!(!cal.is_trading_day(date(2025, 11, 27))); // Thanksgiving
        assert!(!cal.is_trading_day(date(2025, 12, 25)));
        assert!(cal.is_trading_day(date(2025, 11, 28)));
        // Wed -> Fri over Thanksgiving is a single trading day
        assert_eq!(cal.trading_days_between(date(2025, 11, 26), date(2025, 11, 28)), 1);
    }

    #[test]
    fn test_trading_days_between_across_weekend() {
        let cal = TradingCalendar::new_york();
        // Thursday -> next Tuesday: Fri, Mon, Tue
        assert_eq!(cal.trading_days_between(date(2025, 3, 6), date(2025, 3, 11)), 3);
        assert_eq!(cal.trading_days_between(date(2025, 3, 6), date(2025, 3, 6)), 0);
        assert_eq!(cal.trading_days_between(date(2025, 3, 11), date(2025, 3, 6)), 0);
    }

    #[test]
    fn test_local_date_uses_exchange_timezone() {
        let cal = TradingCalendar::new_york();
        // 02:30 UTC on the 11th is still the evening of the 10th in New York
        let instant = Utc.with_ymd_and_hms(2025, 3, 11, 2, 30, 0).unwrap();
        assert_eq!(cal.local_date(instant), date(2025, 3, 10));
        assert_eq!(cal.local_time(instant), NaiveTime::from_hms_opt(22, 30, 0).unwrap());
    }
}
