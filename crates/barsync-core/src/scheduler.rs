//! Rate-limited fetch scheduling.
//!
//! The scheduler turns a [`SyncWindow`] into one or more provider calls:
//! windows wider than the provider's `max_span_days` are chunked, every call
//! waits on the shared [`RateGate`], and chunk results merge by date with the
//! later chunk winning on overlap. `dispatch` runs many windows concurrently
//! with in-flight calls capped at the quota limit, streaming outcomes back in
//! completion order.

use std::sync::Arc;

use time::Date;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::domain::{merge_by_date, DailyBar, InstrumentCode};
use crate::policy::{SyncReason, SyncWindow};
use crate::source::{BarsQuery, MarketSource, SourceError};
use crate::sync::CancelFlag;
use crate::throttle::RateGate;

/// Result of fetching one instrument's window.
#[derive(Debug)]
pub struct FetchOutcome {
    pub code: InstrumentCode,
    pub reason: SyncReason,
    pub result: Result<Vec<DailyBar>, SourceError>,
}

/// Fetches sync windows against a [`MarketSource`] within its quota.
#[derive(Clone)]
pub struct FetchScheduler {
    source: Arc<dyn MarketSource>,
    gate: RateGate,
}

impl FetchScheduler {
    #[must_use]
    pub fn new(source: Arc<dyn MarketSource>) -> Self {
        let quota = source.quota();
        Self {
            source,
            gate: RateGate::new(quota.window, quota.max_calls),
        }
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch one window, chunking it to the provider's span limit and pacing
    /// each call through the rate gate.
    ///
    /// Bars that fail validation are dropped with a warning; the fetch still
    /// succeeds with the remaining records.
    ///
    /// # Errors
    /// Fails with the first chunk's [`SourceError`]; chunks already fetched
    /// are discarded so the caller never merges a partial window. A fetch
    /// whose every bar fails validation is an invalid-payload error.
    pub async fn fetch_window(&self, window: &SyncWindow) -> Result<Vec<DailyBar>, SourceError> {
        let max_span_days = self.source.quota().max_span_days;
        let mut batches = Vec::new();

        for (from, to) in chunk_spans(window.from, window.to, max_span_days) {
            self.gate.acquire().await;
            let query = BarsQuery::new(window.code.clone(), from, to)?;
            debug!(code = %window.code, %from, %to, "fetching chunk");
            batches.push(self.source.fetch_daily_bars(query).await?);
        }

        let mut bars = merge_by_date(batches);
        let fetched = bars.len();
        bars.retain(|bar| match bar.validate() {
            Ok(()) => true,
            Err(error) => {
                warn!(code = %bar.code, date = %bar.date, %error, "dropping invalid bar");
                false
            }
        });
        // A non-empty fetch with nothing left is a broken payload, not an
        // instrument with no data.
        if fetched > 0 && bars.is_empty() {
            return Err(SourceError::invalid_payload(format!(
                "all {fetched} fetched bars failed validation"
            )));
        }
        Ok(bars)
    }

    /// Run many windows concurrently, in-flight calls capped at the quota
    /// limit, and stream outcomes in completion order.
    ///
    /// Windows not yet started when `cancel` is raised are abandoned; their
    /// outcomes never arrive, so callers must not wait for one message per
    /// window after cancellation.
    #[must_use]
    pub fn dispatch(
        &self,
        windows: Vec<SyncWindow>,
        cancel: CancelFlag,
    ) -> mpsc::Receiver<FetchOutcome> {
        let capacity = windows.len().max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let in_flight = Arc::new(Semaphore::new(self.source.quota().max_calls.max(1) as usize));

        for window in windows {
            let scheduler = self.clone();
            let sender = sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let cancel = cancel.clone();

            tokio::spawn(async move {
                let Ok(_permit) = in_flight.acquire().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    return;
                }

                let result = scheduler.fetch_window(&window).await;
                let outcome = FetchOutcome {
                    code: window.code,
                    reason: window.reason,
                    result,
                };
                let _ = sender.send(outcome).await;
            });
        }

        receiver
    }
}

/// Split an inclusive date range into inclusive chunks of at most
/// `max_span_days` calendar days each.
fn chunk_spans(from: Date, to: Date, max_span_days: u32) -> Vec<(Date, Date)> {
    let span_days = i64::from(max_span_days.max(1));
    let mut chunks = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start
            .checked_add(time::Duration::days(span_days - 1))
            .unwrap_or(to)
            .min(to);
        chunks.push((start, end));
        start = match end.next_day() {
            Some(next) => next,
            None => break,
        };
    }

    chunks
}
