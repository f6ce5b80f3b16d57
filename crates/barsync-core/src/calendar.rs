//! Trading-day calendar for the Korean exchange.
//!
//! The calendar answers three questions: is a date a trading day, which
//! session date is "today" for a given wall-clock instant, and which trading
//! days fall in a range. "Today" honors the 09:00 KST market open: before the
//! open, the current session is still the previous calendar day's.

use std::collections::{BTreeMap, BTreeSet};

use time::macros::{date, offset, time};
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset, Weekday};
use tracing::warn;

/// Bound for the backwards search in [`TradingCalendar::last_trading_day`].
/// Korean market closures never exceed two weeks in a row.
const MAX_LOOKBACK_DAYS: i64 = 14;

/// Exchange calendar: weekday schedule plus per-year holiday sets.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    holidays: BTreeMap<i32, BTreeSet<Date>>,
    market_open: Time,
    market_offset: UtcOffset,
}

impl TradingCalendar {
    /// The KRX calendar with 2025 exchange holidays.
    #[must_use]
    pub fn krx() -> Self {
        let holidays_2025 = [
            date!(2025 - 01 - 01),
            date!(2025 - 01 - 28),
            date!(2025 - 01 - 29),
            date!(2025 - 01 - 30),
            date!(2025 - 03 - 01),
            date!(2025 - 05 - 05),
            date!(2025 - 05 - 06),
            date!(2025 - 06 - 06),
            date!(2025 - 08 - 15),
            date!(2025 - 10 - 03),
            date!(2025 - 10 - 06),
            date!(2025 - 10 - 09),
            date!(2025 - 12 - 25),
        ];

        let mut holidays = BTreeMap::new();
        holidays.insert(2025, holidays_2025.into_iter().collect());

        Self {
            holidays,
            market_open: time!(09:00),
            market_offset: offset!(+9),
        }
    }

    /// True when the date is a weekday and not an exchange holiday.
    ///
    /// Years with no registered holiday set fall back to the weekday rule
    /// only.
    #[must_use]
    pub fn is_trading_day(&self, date: Date) -> bool {
        if matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
            return false;
        }
        self.holidays
            .get(&date.year())
            .is_none_or(|days| !days.contains(&date))
    }

    /// The calendar date of the current trading session at `now`.
    ///
    /// Before the 09:00 local market open the session date is the previous
    /// calendar day; the result may still be a weekend or holiday and is
    /// usually passed through [`Self::last_trading_day`].
    #[must_use]
    pub fn market_today(&self, now: OffsetDateTime) -> Date {
        let local = now.to_offset(self.market_offset);
        if local.time() < self.market_open {
            local.date().previous_day().unwrap_or_else(|| local.date())
        } else {
            local.date()
        }
    }

    /// Most recent trading day at or before `date`, searching back at most
    /// two weeks. An exhausted search indicates bad holiday data; the input
    /// date comes back unchanged with a warning.
    #[must_use]
    pub fn last_trading_day(&self, date: Date) -> Date {
        let mut candidate = date;
        for _ in 0..=MAX_LOOKBACK_DAYS {
            if self.is_trading_day(candidate) {
                return candidate;
            }
            candidate = match candidate.previous_day() {
                Some(previous) => previous,
                None => break,
            };
        }
        warn!(%date, "no trading day within {MAX_LOOKBACK_DAYS} days");
        date
    }

    /// Trading days in the half-open range `[start, end)`, ascending.
    #[must_use]
    pub fn trading_days_between(&self, start: Date, end: Date) -> Vec<Date> {
        let mut days = Vec::new();
        let mut current = start;
        while current < end {
            if self.is_trading_day(current) {
                days.push(current);
            }
            current = match current.next_day() {
                Some(next) => next,
                None => break,
            };
        }
        days
    }

    /// `date` advanced by `days` calendar days, saturating at the calendar
    /// bounds.
    #[must_use]
    pub fn add_days(date: Date, days: i64) -> Date {
        date.checked_add(Duration::days(days)).unwrap_or(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn weekdays_trade_and_weekends_do_not() {
        let calendar = TradingCalendar::krx();
        assert!(calendar.is_trading_day(date!(2025 - 03 - 05))); // Wednesday
        assert!(!calendar.is_trading_day(date!(2025 - 03 - 08))); // Saturday
        assert!(!calendar.is_trading_day(date!(2025 - 03 - 09))); // Sunday
    }

    #[test]
    fn exchange_holidays_do_not_trade() {
        let calendar = TradingCalendar::krx();
        assert!(!calendar.is_trading_day(date!(2025 - 01 - 01)));
        assert!(!calendar.is_trading_day(date!(2025 - 10 - 06)));
        assert!(!calendar.is_trading_day(date!(2025 - 12 - 25)));
    }

    #[test]
    fn market_today_rolls_back_before_open() {
        let calendar = TradingCalendar::krx();
        // 08:59 KST belongs to the previous session date.
        assert_eq!(
            calendar.market_today(datetime!(2025-03-05 08:59 +9)),
            date!(2025 - 03 - 04)
        );
        assert_eq!(
            calendar.market_today(datetime!(2025-03-05 09:00 +9)),
            date!(2025 - 03 - 05)
        );
    }

    #[test]
    fn market_today_converts_from_utc() {
        let calendar = TradingCalendar::krx();
        // 23:30 UTC on the 4th is 08:30 KST on the 5th, before the open.
        assert_eq!(
            calendar.market_today(datetime!(2025-03-04 23:30 UTC)),
            date!(2025 - 03 - 04)
        );
        // 01:00 UTC on the 5th is 10:00 KST on the 5th.
        assert_eq!(
            calendar.market_today(datetime!(2025-03-05 01:00 UTC)),
            date!(2025 - 03 - 05)
        );
    }

    #[test]
    fn last_trading_day_skips_weekends_and_holidays() {
        let calendar = TradingCalendar::krx();
        // Sunday rolls back past Saturday to Friday.
        assert_eq!(
            calendar.last_trading_day(date!(2025 - 03 - 09)),
            date!(2025 - 03 - 07)
        );
        // The lunar new year block (Jan 28-30) rolls back to Monday Jan 27.
        assert_eq!(
            calendar.last_trading_day(date!(2025 - 01 - 30)),
            date!(2025 - 01 - 27)
        );
    }

    #[test]
    fn trading_days_between_is_half_open() {
        let calendar = TradingCalendar::krx();
        let days = calendar.trading_days_between(date!(2025 - 03 - 03), date!(2025 - 03 - 10));
        assert_eq!(
            days,
            vec![
                date!(2025 - 03 - 03),
                date!(2025 - 03 - 04),
                date!(2025 - 03 - 05),
                date!(2025 - 03 - 06),
                date!(2025 - 03 - 07),
            ],
            "end date is excluded, weekend is skipped"
        );
    }

    #[test]
    fn trading_days_between_empty_when_start_not_before_end() {
        let calendar = TradingCalendar::krx();
        assert!(calendar
            .trading_days_between(date!(2025 - 03 - 10), date!(2025 - 03 - 10))
            .is_empty());
        assert!(calendar
            .trading_days_between(date!(2025 - 03 - 11), date!(2025 - 03 - 10))
            .is_empty());
    }
}
