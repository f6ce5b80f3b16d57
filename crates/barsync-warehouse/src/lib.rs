//! # barsync Warehouse
//!
//! `DuckDB`-backed storage for the barsync collector.
//!
//! The warehouse owns two tables:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `instruments` | Tracked instruments with last-sync bookkeeping |
//! | `daily_bars` | Daily OHLCV bars, unique on (code, date) |
//!
//! All writes are parameterized and transactional; `upsert_daily_bars` is
//! idempotent on (code, date) and replaces on conflict, so re-ingesting the
//! same records leaves storage unchanged.

pub mod migrations;
pub mod pool;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use duckdb::{Connection, ToSql};
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

pub use pool::{ConnectionPool, PooledConnection};

const DATE_FMT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TS_FMT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (database directory creation).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored or supplied value could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_barsync_home().join("warehouse.duckdb"),
            max_pool_size: 4,
        }
    }
}

/// A tracked instrument row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRow {
    pub code: String,
    pub name: String,
    pub market: Option<String>,
    pub is_active: bool,
    pub last_synced_date: Option<Date>,
    pub last_synced_at: Option<OffsetDateTime>,
}

/// A daily OHLCV bar row as stored. Prices are KRW integers; the percent
/// change is scaled by 100 into `change_rate_bp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBarRow {
    pub code: String,
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

/// Aggregate counts for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub instrument_count: i64,
    pub bar_count: i64,
    pub latest_bar_date: Option<Date>,
}

/// The warehouse interface for instrument metadata and daily bars.
#[derive(Clone)]
pub struct Warehouse {
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration
    /// (`$BARSYNC_HOME/warehouse.duckdb`).
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse, creating the database directory and applying
    /// migrations as needed.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Path to the database file.
    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Cheap reachability check used as a batch precondition.
    pub fn ping(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        let one: i64 = connection.query_row("SELECT 1", [], |row| row.get(0))?;
        debug_assert_eq!(one, 1);
        Ok(())
    }

    /// Register an instrument if it is not tracked yet. Existing rows are
    /// left untouched.
    pub fn ensure_tracked(&self, row: &InstrumentRow) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        let params: [&dyn ToSql; 4] = [&row.code, &row.name, &row.market, &row.is_active];
        connection.execute(
            "INSERT OR IGNORE INTO instruments (code, name, market, is_active) \
             VALUES (?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// All tracked instruments, ordered by code.
    pub fn list_instruments(&self) -> Result<Vec<InstrumentRow>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let mut statement = connection.prepare(&format!(
            "{INSTRUMENT_SELECT} FROM instruments ORDER BY code"
        ))?;

        let rows = statement.query_map([], read_instrument_columns)?;
        let mut instruments = Vec::new();
        for row in rows {
            instruments.push(hydrate_instrument(row?)?);
        }
        Ok(instruments)
    }

    /// Look up one tracked instrument by code. Queries a single row; batch
    /// planning calls this once per instrument.
    pub fn instrument(&self, code: &str) -> Result<Option<InstrumentRow>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let mut statement = connection.prepare(&format!(
            "{INSTRUMENT_SELECT} FROM instruments WHERE code = ?"
        ))?;

        let mut rows = statement.query_map([code], read_instrument_columns)?;
        match rows.next() {
            Some(row) => Ok(Some(hydrate_instrument(row?)?)),
            None => Ok(None),
        }
    }

    /// Merge daily bars into storage. Idempotent on (code, date): a later
    /// write with the same key replaces the earlier one.
    pub fn upsert_daily_bars(&self, rows: &[DailyBarRow]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }

        let connection = self.pool.checkout()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            for row in rows {
                let date = format_date(row.date)?;
                let params: [&dyn ToSql; 10] = [
                    &row.code,
                    &date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &row.volume,
                    &row.traded_value,
                    &row.prev_day_delta,
                    &row.change_rate_bp,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO daily_bars \
                     (code, date, open, high, low, close, volume, traded_value, \
                      prev_day_delta, change_rate_bp, updated_at) \
                     VALUES (?, TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)?;
        debug!(code = %rows[0].code, rows = rows.len(), "merged daily bars");
        Ok(())
    }

    /// Most recent bar date held for an instrument.
    pub fn latest_bar_date(&self, code: &str) -> Result<Option<Date>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let latest: Option<String> = connection.query_row(
            "SELECT CAST(MAX(date) AS VARCHAR) FROM daily_bars WHERE code = ?",
            [code],
            |row| row.get(0),
        )?;
        latest.as_deref().map(parse_date).transpose()
    }

    /// Advance an instrument's sync bookkeeping after a successful merge.
    pub fn mark_synced(
        &self,
        code: &str,
        date: Date,
        at: OffsetDateTime,
    ) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        let date = format_date(date)?;
        let at = format_timestamp(at)?;
        let params: [&dyn ToSql; 3] = [&date, &at, &code];
        connection.execute(
            "UPDATE instruments \
             SET last_synced_date = TRY_CAST(? AS DATE), \
                 last_synced_at = TRY_CAST(? AS TIMESTAMP), \
                 updated_at = CURRENT_TIMESTAMP \
             WHERE code = ?",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Aggregate counts for reporting.
    pub fn status(&self) -> Result<StatusSummary, WarehouseError> {
        let connection = self.pool.checkout()?;
        let (instrument_count, bar_count, latest): (i64, i64, Option<String>) = connection
            .query_row(
                "SELECT (SELECT COUNT(*) FROM instruments), \
                        (SELECT COUNT(*) FROM daily_bars), \
                        (SELECT CAST(MAX(date) AS VARCHAR) FROM daily_bars)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
        Ok(StatusSummary {
            instrument_count,
            bar_count,
            latest_bar_date: latest.as_deref().map(parse_date).transpose()?,
        })
    }
}

const INSTRUMENT_SELECT: &str = "SELECT code, name, market, is_active, \
     CAST(last_synced_date AS VARCHAR), CAST(last_synced_at AS VARCHAR)";

type InstrumentColumns = (
    String,
    String,
    Option<String>,
    bool,
    Option<String>,
    Option<String>,
);

fn read_instrument_columns(row: &duckdb::Row<'_>) -> Result<InstrumentColumns, duckdb::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn hydrate_instrument(columns: InstrumentColumns) -> Result<InstrumentRow, WarehouseError> {
    let (code, name, market, is_active, synced_date, synced_at) = columns;
    Ok(InstrumentRow {
        code,
        name,
        market,
        is_active,
        last_synced_date: synced_date.as_deref().map(parse_date).transpose()?,
        last_synced_at: synced_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn format_date(date: Date) -> Result<String, WarehouseError> {
    date.format(DATE_FMT)
        .map_err(|error| WarehouseError::InvalidData(error.to_string()))
}

fn parse_date(value: &str) -> Result<Date, WarehouseError> {
    Date::parse(value, DATE_FMT)
        .map_err(|error| WarehouseError::InvalidData(format!("bad date '{value}': {error}")))
}

/// Timestamps are stored as naive UTC.
fn format_timestamp(at: OffsetDateTime) -> Result<String, WarehouseError> {
    let utc = at.to_offset(time::UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
        .format(TS_FMT)
        .map_err(|error| WarehouseError::InvalidData(error.to_string()))
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime, WarehouseError> {
    // DuckDB renders timestamps with optional fractional seconds; the
    // fraction is ours to drop since we never write one.
    let trimmed = value.split('.').next().unwrap_or(value);
    PrimitiveDateTime::parse(trimmed, TS_FMT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|error| WarehouseError::InvalidData(format!("bad timestamp '{value}': {error}")))
}

/// Resolve the barsync home directory from the environment or default.
fn resolve_barsync_home() -> PathBuf {
    if let Some(path) = env::var_os("BARSYNC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".barsync");
    }

    PathBuf::from(".barsync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::macros::{date, datetime};

    fn open_temp() -> (Warehouse, tempfile::TempDir) {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig {
            db_path: temp.path().join("warehouse.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open");
        (warehouse, temp)
    }

    fn bar(code: &str, date: Date, close: i64) -> DailyBarRow {
        DailyBarRow {
            code: code.to_string(),
            date,
            open: close - 100,
            high: close + 200,
            low: close - 300,
            close,
            volume: 1_000_000,
            traded_value: 70_000_000_000,
            prev_day_delta: 150,
            change_rate_bp: 21,
        }
    }

    #[test]
    fn upsert_is_idempotent_on_code_and_date() {
        let (warehouse, _temp) = open_temp();
        let rows = vec![
            bar("005930", date!(2025 - 03 - 04), 71_000),
            bar("005930", date!(2025 - 03 - 05), 71_500),
        ];

        warehouse.upsert_daily_bars(&rows).expect("first upsert");
        warehouse.upsert_daily_bars(&rows).expect("second upsert");

        let status = warehouse.status().expect("status");
        assert_eq!(status.bar_count, 2);
        assert_eq!(status.latest_bar_date, Some(date!(2025 - 03 - 05)));
    }

    #[test]
    fn upsert_replaces_on_conflict() {
        let (warehouse, _temp) = open_temp();
        let day = date!(2025 - 03 - 05);

        warehouse
            .upsert_daily_bars(&[bar("005930", day, 70_000)])
            .expect("upsert");
        warehouse
            .upsert_daily_bars(&[bar("005930", day, 72_000)])
            .expect("upsert replacement");

        let status = warehouse.status().expect("status");
        assert_eq!(status.bar_count, 1, "replacement must not append");
    }

    #[test]
    fn mark_synced_round_trips_through_instrument_row() {
        let (warehouse, _temp) = open_temp();
        warehouse
            .ensure_tracked(&InstrumentRow {
                code: "005930".to_string(),
                name: "Samsung Electronics".to_string(),
                market: Some("kospi".to_string()),
                is_active: true,
                last_synced_date: None,
                last_synced_at: None,
            })
            .expect("track");

        warehouse
            .mark_synced(
                "005930",
                date!(2025 - 03 - 05),
                datetime!(2025-03-05 10:00 +9),
            )
            .expect("mark synced");

        let row = warehouse
            .instrument("005930")
            .expect("lookup")
            .expect("row present");
        assert_eq!(row.last_synced_date, Some(date!(2025 - 03 - 05)));
        assert_eq!(
            row.last_synced_at,
            Some(datetime!(2025-03-05 01:00 UTC)),
            "timestamps are stored as naive UTC"
        );
    }

    #[test]
    fn ensure_tracked_leaves_existing_rows_untouched() {
        let (warehouse, _temp) = open_temp();
        let row = InstrumentRow {
            code: "000660".to_string(),
            name: "SK hynix".to_string(),
            market: Some("kospi".to_string()),
            is_active: true,
            last_synced_date: None,
            last_synced_at: None,
        };
        warehouse.ensure_tracked(&row).expect("track");
        warehouse
            .mark_synced("000660", date!(2025 - 03 - 04), datetime!(2025-03-04 18:00 +9))
            .expect("mark");

        // Re-registering must not reset sync bookkeeping.
        warehouse.ensure_tracked(&row).expect("re-track");
        let stored = warehouse
            .instrument("000660")
            .expect("lookup")
            .expect("row present");
        assert_eq!(stored.last_synced_date, Some(date!(2025 - 03 - 04)));
    }

    #[test]
    fn instrument_lookup_targets_a_single_row() {
        let (warehouse, _temp) = open_temp();
        for (code, name) in [
            ("000660", "SK hynix"),
            ("005930", "Samsung Electronics"),
            ("035420", "NAVER"),
        ] {
            warehouse
                .ensure_tracked(&InstrumentRow {
                    code: code.to_string(),
                    name: name.to_string(),
                    market: Some("kospi".to_string()),
                    is_active: true,
                    last_synced_date: None,
                    last_synced_at: None,
                })
                .expect("track");
        }

        let row = warehouse
            .instrument("005930")
            .expect("lookup")
            .expect("row present");
        assert_eq!(row.name, "Samsung Electronics");
        assert!(warehouse.instrument("999999").expect("lookup").is_none());
    }

    #[test]
    fn latest_bar_date_is_none_for_unknown_code() {
        let (warehouse, _temp) = open_temp();
        assert_eq!(warehouse.latest_bar_date("999999").expect("query"), None);
    }
}
