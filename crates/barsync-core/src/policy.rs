//! Staleness policy: decide whether and how far back to fetch.

use time::macros::date;
use time::{Date, OffsetDateTime};

use crate::calendar::TradingCalendar;
use crate::domain::InstrumentCode;

/// Lower bound for full-history fetches of never-synced instruments.
pub const FAR_PAST: Date = date!(1990 - 01 - 01);

/// Why an instrument was scheduled for fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    /// No prior sync bookkeeping, fetch full history.
    NeverSynced,
    /// Behind the latest completed trading session.
    Stale,
    /// Explicitly forced regardless of staleness.
    Forced,
}

/// An inclusive date range to fetch for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWindow {
    pub code: InstrumentCode,
    pub from: Date,
    pub to: Date,
    pub reason: SyncReason,
}

/// Plans fetch windows against the trading calendar.
#[derive(Debug, Clone)]
pub struct SyncPlanner {
    calendar: TradingCalendar,
}

impl SyncPlanner {
    #[must_use]
    pub fn new(calendar: TradingCalendar) -> Self {
        Self { calendar }
    }

    #[must_use]
    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Decide the fetch window for one instrument, or `None` when it is
    /// already current and not forced.
    ///
    /// Staleness is measured in missing trading days between the last synced
    /// date and the current session date; the session-open cutoff inside
    /// [`TradingCalendar::market_today`] keeps a still-forming session from
    /// counting as missing. A forced plan re-fetches the last synced day as
    /// well, to repair bars that may have been revised.
    #[must_use]
    pub fn plan(
        &self,
        code: &InstrumentCode,
        last_synced: Option<Date>,
        now: OffsetDateTime,
        force: bool,
    ) -> Option<SyncWindow> {
        let session = self.calendar.market_today(now);

        let Some(synced) = last_synced else {
            return Some(SyncWindow {
                code: code.clone(),
                from: FAR_PAST,
                to: session,
                reason: SyncReason::NeverSynced,
            });
        };

        if force {
            return Some(SyncWindow {
                code: code.clone(),
                from: synced.min(session),
                to: session,
                reason: SyncReason::Forced,
            });
        }

        let missing = self.calendar.trading_days_between(
            TradingCalendar::add_days(synced, 1),
            TradingCalendar::add_days(session, 1),
        );
        match (missing.first(), missing.last()) {
            (Some(&from), Some(&to)) => Some(SyncWindow {
                code: code.clone(),
                from,
                to,
                reason: SyncReason::Stale,
            }),
            _ => None,
        }
    }
}
