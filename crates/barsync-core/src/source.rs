//! Market data source contract.
//!
//! A [`MarketSource`] fetches daily bars for one instrument over an inclusive
//! date range. Implementations declare their own [`SourceQuota`]; the
//! scheduler enforces it, so sources never throttle themselves.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use time::Date;

use crate::domain::{DailyBar, InstrumentCode};

/// Provider-declared call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuota {
    /// Maximum calls per rolling `window`.
    pub max_calls: u32,
    /// Length of the rolling quota window.
    pub window: Duration,
    /// Widest date span one call may cover, in calendar days.
    pub max_span_days: u32,
}

impl SourceQuota {
    #[must_use]
    pub const fn new(max_calls: u32, window: Duration, max_span_days: u32) -> Self {
        Self {
            max_calls,
            window,
            max_span_days,
        }
    }
}

/// Per-instrument source error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Transport,
    InvalidPayload,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured source error carried into the batch report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidPayload,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::InvalidPayload => "source.invalid_payload",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// A single fetch request: one instrument, one inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsQuery {
    pub code: InstrumentCode,
    pub from: Date,
    pub to: Date,
}

impl BarsQuery {
    /// # Errors
    /// Returns an invalid-request error when `from` is after `to`.
    pub fn new(code: InstrumentCode, from: Date, to: Date) -> Result<Self, SourceError> {
        if from > to {
            return Err(SourceError::invalid_request(format!(
                "query range inverted: {from} > {to}"
            )));
        }
        Ok(Self { code, from, to })
    }
}

/// Daily bar provider contract.
///
/// Implementations must be `Send + Sync`; the scheduler shares one instance
/// across concurrent fetch tasks.
pub trait MarketSource: Send + Sync {
    /// Human-readable provider name for logs and reports.
    fn name(&self) -> &str;

    /// The quota this provider allows. The scheduler chunks and paces calls
    /// to stay inside it.
    fn quota(&self) -> SourceQuota;

    /// Fetch daily bars for the query range, ascending by date.
    ///
    /// An empty result is not an error: the instrument simply has no bars in
    /// the range (delisted, suspended, or never listed).
    fn fetch_daily_bars<'a>(
        &'a self,
        query: BarsQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DailyBar>, SourceError>> + Send + 'a>>;
}
