//! Shared fixtures for the behavior test suites.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::{tempdir, TempDir};
use time::Date;

use barsync_core::{
    BarsQuery, DailyBar, InstrumentCode, MarketSource, SourceError, SourceQuota,
};
use barsync_warehouse::{Warehouse, WarehouseConfig};

/// One recorded provider call, with its wall-clock arrival time.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub code: String,
    pub from: Date,
    pub to: Date,
    pub at: Instant,
}

struct StubInner {
    quota: SourceQuota,
    bars: Mutex<HashMap<String, Vec<DailyBar>>>,
    errors: Mutex<HashMap<String, SourceError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Scripted market source: serves canned bars per code, filtered to the
/// queried range, and records every call it receives.
#[derive(Clone)]
pub struct StubSource {
    inner: Arc<StubInner>,
}

impl StubSource {
    pub fn new(quota: SourceQuota) -> Self {
        Self {
            inner: Arc::new(StubInner {
                quota,
                bars: Mutex::new(HashMap::new()),
                errors: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A forgiving default: spacing in the single milliseconds and spans
    /// wide enough that full-history windows fit in one call.
    pub fn relaxed() -> Self {
        Self::new(SourceQuota::new(100, Duration::from_millis(100), 36_500))
    }

    pub fn serve_bars(&self, code: &InstrumentCode, bars: Vec<DailyBar>) {
        self.inner
            .bars
            .lock()
            .expect("stub bars mutex")
            .insert(code.to_string(), bars);
    }

    pub fn fail_with(&self, code: &InstrumentCode, error: SourceError) {
        self.inner
            .errors
            .lock()
            .expect("stub errors mutex")
            .insert(code.to_string(), error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().expect("stub calls mutex").clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().expect("stub calls mutex").len()
    }
}

impl MarketSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    fn quota(&self) -> SourceQuota {
        self.inner.quota
    }

    fn fetch_daily_bars<'a>(
        &'a self,
        query: BarsQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DailyBar>, SourceError>> + Send + 'a>> {
        self.inner
            .calls
            .lock()
            .expect("stub calls mutex")
            .push(RecordedCall {
                code: query.code.to_string(),
                from: query.from,
                to: query.to,
                at: Instant::now(),
            });

        let error = self
            .inner
            .errors
            .lock()
            .expect("stub errors mutex")
            .get(query.code.as_str())
            .cloned();
        let bars = self
            .inner
            .bars
            .lock()
            .expect("stub bars mutex")
            .get(query.code.as_str())
            .map(|bars| {
                bars.iter()
                    .filter(|bar| bar.date >= query.from && bar.date <= query.to)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Box::pin(async move {
            match error {
                Some(error) => Err(error),
                None => Ok(bars),
            }
        })
    }
}

/// A warehouse backed by a temporary directory. Keep the guard alive for the
/// duration of the test.
pub fn temp_warehouse() -> (Warehouse, TempDir) {
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::open(WarehouseConfig {
        db_path: temp.path().join("warehouse.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open");
    (warehouse, temp)
}

pub fn code(value: &str) -> InstrumentCode {
    InstrumentCode::parse(value).expect("valid instrument code")
}

pub fn daily_bar(code: &InstrumentCode, date: Date, close: i64) -> DailyBar {
    DailyBar {
        code: code.clone(),
        date,
        open: close - 100,
        high: close + 200,
        low: close - 300,
        close,
        volume: 1_000_000,
        traded_value: close * 1_000_000,
        prev_day_delta: 100,
        change_rate_bp: 14,
    }
}
