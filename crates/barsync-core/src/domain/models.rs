//! Core domain models: markets, instruments, and daily bars.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::InstrumentCode;
use crate::error::ValidationError;

/// Exchange segment an instrument trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Kospi,
    Kosdaq,
}

impl Market {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kospi => "kospi",
            Self::Kosdaq => "kosdaq",
        }
    }

    /// Parse a market label, case-insensitively.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidMarket`] for unknown labels.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kospi" => Ok(Self::Kospi),
            "kosdaq" => Ok(Self::Kosdaq),
            other => Err(ValidationError::InvalidMarket(other.to_string())),
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked instrument. `market` is optional because instruments registered
/// by bare code have no segment metadata yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub code: InstrumentCode,
    pub name: String,
    pub market: Option<Market>,
    pub is_active: bool,
}

impl Instrument {
    #[must_use]
    pub fn new(code: InstrumentCode, name: impl Into<String>, market: Option<Market>) -> Self {
        Self {
            code,
            name: name.into(),
            market,
            is_active: true,
        }
    }
}

/// One daily OHLCV bar. Prices are integer KRW; `change_rate_bp` is the
/// day-over-day percent change scaled by 100 (basis points).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBar {
    pub code: InstrumentCode,
    pub date: Date,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
    pub traded_value: i64,
    pub prev_day_delta: i64,
    pub change_rate_bp: i32,
}

impl DailyBar {
    /// Check bar invariants: close positive, high >= low, open and close
    /// within [low, high], volume and traded value non-negative.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.close <= 0 {
            return Err(ValidationError::NonPositiveClose(self.close));
        }
        if self.high < self.low {
            return Err(ValidationError::InvalidBarRange {
                high: self.high,
                low: self.low,
            });
        }
        for (field, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(ValidationError::InvalidBarBounds {
                    field,
                    value,
                    low: self.low,
                    high: self.high,
                });
            }
        }
        for (field, value) in [("volume", self.volume), ("traded_value", self.traded_value)] {
            if value < 0 {
                return Err(ValidationError::NegativeValue { field, value });
            }
        }
        Ok(())
    }
}

/// Merge bar batches by date, last write wins, result sorted ascending.
///
/// Chunked fetches can overlap at span boundaries; the later chunk's copy of
/// a date replaces the earlier one.
#[must_use]
pub fn merge_by_date(batches: Vec<Vec<DailyBar>>) -> Vec<DailyBar> {
    let mut merged: BTreeMap<Date, DailyBar> = BTreeMap::new();
    for batch in batches {
        for bar in batch {
            merged.insert(bar.date, bar);
        }
    }
    merged.into_values().collect()
}
