//! Storage seam for the sync engine.
//!
//! [`SyncRepository`] is the only view the engine has of persistent state;
//! the warehouse implementation below maps domain types onto stored rows.

use time::{Date, OffsetDateTime};

use barsync_warehouse::{DailyBarRow, InstrumentRow, Warehouse};

use crate::domain::{DailyBar, Instrument, InstrumentCode, Market};
use crate::error::SyncError;

/// Persistent state operations the sync engine needs.
pub trait SyncRepository: Send + Sync {
    /// Reachability check, run once before a batch starts.
    fn ping(&self) -> Result<(), SyncError>;

    /// Register an instrument when first seen; never overwrites.
    fn ensure_tracked(&self, instrument: &Instrument) -> Result<(), SyncError>;

    /// All tracked instruments.
    fn list_tracked(&self) -> Result<Vec<Instrument>, SyncError>;

    /// The date through which an instrument is known to be synced, taking
    /// whichever of the sync bookkeeping and the stored bars is newer.
    fn latest_synced_date(&self, code: &InstrumentCode) -> Result<Option<Date>, SyncError>;

    /// Merge bars into storage, idempotent on (code, date).
    fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<(), SyncError>;

    /// Advance sync bookkeeping after a successful merge.
    fn record_synced(
        &self,
        code: &InstrumentCode,
        date: Date,
        at: OffsetDateTime,
    ) -> Result<(), SyncError>;
}

impl SyncRepository for Warehouse {
    fn ping(&self) -> Result<(), SyncError> {
        Ok(Warehouse::ping(self)?)
    }

    fn ensure_tracked(&self, instrument: &Instrument) -> Result<(), SyncError> {
        let row = InstrumentRow {
            code: instrument.code.to_string(),
            name: instrument.name.clone(),
            market: instrument.market.map(|market| market.as_str().to_string()),
            is_active: instrument.is_active,
            last_synced_date: None,
            last_synced_at: None,
        };
        Ok(Warehouse::ensure_tracked(self, &row)?)
    }

    fn list_tracked(&self) -> Result<Vec<Instrument>, SyncError> {
        let rows = self.list_instruments()?;
        let mut instruments = Vec::with_capacity(rows.len());
        for row in rows {
            instruments.push(instrument_from_row(row)?);
        }
        Ok(instruments)
    }

    fn latest_synced_date(&self, code: &InstrumentCode) -> Result<Option<Date>, SyncError> {
        let bookkept = self
            .instrument(code.as_str())?
            .and_then(|row| row.last_synced_date);
        let stored = self.latest_bar_date(code.as_str())?;
        Ok(match (bookkept, stored) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (date, None) | (None, date) => date,
        })
    }

    fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<(), SyncError> {
        let rows: Vec<DailyBarRow> = bars.iter().map(row_from_bar).collect();
        Ok(Warehouse::upsert_daily_bars(self, &rows)?)
    }

    fn record_synced(
        &self,
        code: &InstrumentCode,
        date: Date,
        at: OffsetDateTime,
    ) -> Result<(), SyncError> {
        Ok(self.mark_synced(code.as_str(), date, at)?)
    }
}

fn instrument_from_row(row: InstrumentRow) -> Result<Instrument, SyncError> {
    let code = InstrumentCode::parse(&row.code)
        .map_err(|error| SyncError::Config(format!("stored instrument code: {error}")))?;
    let market = match row.market.as_deref() {
        Some(label) => Some(
            Market::parse(label)
                .map_err(|error| SyncError::Config(format!("stored market: {error}")))?,
        ),
        None => None,
    };
    Ok(Instrument {
        code,
        name: row.name,
        market,
        is_active: row.is_active,
    })
}

fn row_from_bar(bar: &DailyBar) -> DailyBarRow {
    DailyBarRow {
        code: bar.code.to_string(),
        date: bar.date,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
        traded_value: bar.traded_value,
        prev_day_delta: bar.prev_day_delta,
        change_rate_bp: bar.change_rate_bp,
    }
}
