//! Batch sync orchestration.
//!
//! `SyncEngine` drives a batch end to end: preconditions, per-instrument
//! planning against the staleness policy, concurrent rate-limited fetching,
//! idempotent merging, and a final [`BatchReport`]. One instrument's failure
//! never aborts the batch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calendar::TradingCalendar;
use crate::domain::{Instrument, InstrumentCode};
use crate::error::SyncError;
use crate::policy::SyncPlanner;
use crate::repository::SyncRepository;
use crate::scheduler::FetchScheduler;
use crate::source::{MarketSource, SourceError};

/// Instrument cap applied when a batch runs in test mode.
pub const TEST_MODE_CAP: usize = 5;

/// Cooperative cancellation handle shared between a caller and a running
/// batch. Raising it stops new fetches; in-flight calls complete.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback: (completed, total, instrument just settled).
pub type ProgressFn = Box<dyn FnMut(usize, usize, &InstrumentCode) + Send>;

/// Per-batch options.
#[derive(Default)]
pub struct SyncOptions {
    /// Re-fetch instruments even when they are already current.
    pub force: bool,
    /// Cap the batch at [`TEST_MODE_CAP`] instruments.
    pub test_mode: bool,
    pub on_progress: Option<ProgressFn>,
    pub cancel: CancelFlag,
}

/// One instrument that failed within an otherwise-running batch.
#[derive(Debug, Clone)]
pub struct FailedSync {
    pub code: InstrumentCode,
    pub error: SourceError,
}

/// Outcome of one batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Instruments synced for the first time.
    pub succeeded: usize,
    /// Previously synced instruments that received new bars.
    pub updated: usize,
    /// Instruments already current, or whose fetch returned no bars.
    pub skipped: usize,
    pub failures: Vec<FailedSync>,
    /// Total bars merged into storage.
    pub records_merged: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl BatchReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every planned instrument failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.failures.is_empty() && self.succeeded == 0 && self.updated == 0 && self.skipped == 0
    }
}

/// Orchestrates rate-limited batch synchronization.
pub struct SyncEngine {
    repository: Arc<dyn SyncRepository>,
    scheduler: FetchScheduler,
    planner: SyncPlanner,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        repository: Arc<dyn SyncRepository>,
        source: Arc<dyn MarketSource>,
        calendar: TradingCalendar,
    ) -> Self {
        Self {
            repository,
            scheduler: FetchScheduler::new(source),
            planner: SyncPlanner::new(calendar),
        }
    }

    /// Sync a batch of instruments as of the current wall clock.
    ///
    /// # Errors
    /// Fails only on batch-level preconditions: an empty batch or an
    /// unreachable warehouse. Per-instrument failures land in the report.
    pub async fn sync_batch(
        &self,
        codes: Vec<InstrumentCode>,
        options: SyncOptions,
    ) -> Result<BatchReport, SyncError> {
        self.sync_batch_at(codes, OffsetDateTime::now_utc(), options)
            .await
    }

    /// Sync a batch with an explicit `now`, used for deterministic planning.
    ///
    /// # Errors
    /// Same contract as [`Self::sync_batch`].
    pub async fn sync_batch_at(
        &self,
        mut codes: Vec<InstrumentCode>,
        now: OffsetDateTime,
        mut options: SyncOptions,
    ) -> Result<BatchReport, SyncError> {
        if codes.is_empty() {
            return Err(SyncError::EmptyBatch);
        }
        // First occurrence wins; a duplicate code must not be fetched twice
        // nor counted twice in the report.
        let mut seen = HashSet::new();
        codes.retain(|code| seen.insert(code.clone()));
        if options.test_mode {
            codes.truncate(TEST_MODE_CAP);
        }

        self.repository.ping()?;

        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        let total = codes.len();
        info!(%batch_id, total, source = self.scheduler.source_name(), "batch started");

        let mut report = BatchReport {
            batch_id,
            succeeded: 0,
            updated: 0,
            skipped: 0,
            failures: Vec::new(),
            records_merged: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        };
        let mut completed = 0usize;
        let mut tick = |completed: usize, code: &InstrumentCode| {
            if let Some(on_progress) = options.on_progress.as_mut() {
                on_progress(completed, total, code);
            }
        };

        // Planning pass: decide a window per instrument, settling the
        // already-current ones immediately.
        let mut windows = Vec::new();
        let mut first_sync: HashSet<InstrumentCode> = HashSet::new();
        for code in codes {
            if options.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            self.repository
                .ensure_tracked(&Instrument::new(code.clone(), code.as_str(), None))?;
            let last_synced = self.repository.latest_synced_date(&code)?;
            match self.planner.plan(&code, last_synced, now, options.force) {
                Some(window) => {
                    if last_synced.is_none() {
                        first_sync.insert(code);
                    }
                    windows.push(window);
                }
                None => {
                    report.skipped += 1;
                    completed += 1;
                    tick(completed, &code);
                }
            }
        }

        // Fetch pass: outcomes arrive in completion order.
        if !report.cancelled && !windows.is_empty() {
            let expected = windows.len();
            let mut receiver = self
                .scheduler
                .dispatch(windows, options.cancel.clone());
            let mut settled = 0usize;

            while settled < expected {
                let Some(outcome) = receiver.recv().await else {
                    break;
                };
                settled += 1;
                completed += 1;

                match outcome.result {
                    Ok(bars) if bars.is_empty() => {
                        report.skipped += 1;
                    }
                    Ok(bars) => match self.persist(&outcome.code, &bars, now) {
                        Ok(()) => {
                            report.records_merged += bars.len();
                            if first_sync.contains(&outcome.code) {
                                report.succeeded += 1;
                            } else {
                                report.updated += 1;
                            }
                        }
                        Err(error) => {
                            warn!(code = %outcome.code, %error, "merge failed");
                            report.failures.push(FailedSync {
                                code: outcome.code.clone(),
                                error: SourceError::internal(error.to_string()),
                            });
                        }
                    },
                    Err(error) => {
                        warn!(code = %outcome.code, %error, "fetch failed");
                        report.failures.push(FailedSync {
                            code: outcome.code.clone(),
                            error,
                        });
                    }
                }
                tick(completed, &outcome.code);
            }

            if settled < expected {
                report.cancelled = true;
            }
        }

        report.cancelled = report.cancelled || options.cancel.is_cancelled();
        report.elapsed = started.elapsed();
        info!(
            %batch_id,
            succeeded = report.succeeded,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed(),
            records = report.records_merged,
            cancelled = report.cancelled,
            "batch finished"
        );
        Ok(report)
    }

    fn persist(
        &self,
        code: &InstrumentCode,
        bars: &[crate::domain::DailyBar],
        now: OffsetDateTime,
    ) -> Result<(), SyncError> {
        self.repository.upsert_daily_bars(bars)?;
        // Bars arrive sorted ascending; the last one carries the new
        // high-water mark.
        if let Some(last) = bars.last() {
            self.repository.record_synced(code, last.date, now)?;
        }
        Ok(())
    }
}
