//! REST daily-bar source adapter.
//!
//! Expects a JSON endpoint at `{base_url}/daily-bars` taking `code`, `from`,
//! and `to` query parameters (dates as `YYYYMMDD`) and returning an array of
//! bar objects, ascending by date.

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::domain::{DailyBar, InstrumentCode};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source::{BarsQuery, MarketSource, SourceError, SourceQuota};

const COMPACT_DATE: &[BorrowedFormatItem<'_>] = format_description!("[year][month][day]");
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`RestSource`].
#[derive(Debug, Clone)]
pub struct RestSourceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub quota: SourceQuota,
    pub timeout: Duration,
}

impl RestSourceConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, quota: SourceQuota) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            quota,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from `BARSYNC_SOURCE_URL` and `BARSYNC_API_KEY`.
    ///
    /// # Errors
    /// Fails when `BARSYNC_SOURCE_URL` is unset or empty.
    pub fn from_env(quota: SourceQuota) -> Result<Self, SourceError> {
        let base_url = env::var("BARSYNC_SOURCE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SourceError::invalid_request("BARSYNC_SOURCE_URL is not set"))?;
        let api_key = env::var("BARSYNC_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            base_url,
            api_key,
            quota,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

/// One bar as the endpoint serves it. Prices are integer KRW; `change_rate`
/// is a percent that we scale into basis points.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BarPayload {
    date: String,
    open: i64,
    high: i64,
    low: i64,
    close: i64,
    volume: i64,
    traded_value: i64,
    #[serde(default)]
    prev_day_delta: i64,
    #[serde(default)]
    change_rate: f64,
}

impl BarPayload {
    fn into_bar(self, code: &InstrumentCode) -> Result<DailyBar, SourceError> {
        let date = Date::parse(&self.date, COMPACT_DATE).map_err(|error| {
            SourceError::invalid_payload(format!("bad bar date '{}': {error}", self.date))
        })?;
        #[allow(clippy::cast_possible_truncation)]
        let change_rate_bp = (self.change_rate * 100.0).round() as i32;
        Ok(DailyBar {
            code: code.clone(),
            date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            traded_value: self.traded_value,
            prev_day_delta: self.prev_day_delta,
            change_rate_bp,
        })
    }
}

/// HTTP-backed [`MarketSource`].
pub struct RestSource {
    config: RestSourceConfig,
    http: Arc<dyn HttpClient>,
}

impl RestSource {
    #[must_use]
    pub fn new(config: RestSourceConfig, http: Arc<dyn HttpClient>) -> Self {
        Self { config, http }
    }

    fn bars_url(&self, query: &BarsQuery) -> Result<String, SourceError> {
        let from = format_compact(query.from)?;
        let to = format_compact(query.to)?;
        Ok(format!(
            "{}/daily-bars?code={}&from={}&to={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query.code.as_str()),
            from,
            to,
        ))
    }
}

impl MarketSource for RestSource {
    fn name(&self) -> &str {
        "rest"
    }

    fn quota(&self) -> SourceQuota {
        self.config.quota
    }

    fn fetch_daily_bars<'a>(
        &'a self,
        query: BarsQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DailyBar>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.bars_url(&query)?;
            let mut request = HttpRequest::get(url, self.config.timeout);
            if let Some(token) = &self.config.api_key {
                request = request.with_bearer_token(token.clone());
            }

            let response = self
                .http
                .get(request)
                .await
                .map_err(|error| SourceError::transport(error.to_string()))?;

            match response.status {
                200..=299 => {}
                429 => {
                    return Err(SourceError::rate_limited(format!(
                        "provider throttled request for {}",
                        query.code
                    )))
                }
                status @ 400..=499 => {
                    return Err(SourceError::invalid_request(format!(
                        "provider rejected request for {} with status {status}",
                        query.code
                    )))
                }
                status => {
                    return Err(SourceError::transport(format!(
                        "provider returned status {status} for {}",
                        query.code
                    )))
                }
            }

            let payloads: Vec<BarPayload> = serde_json::from_str(&response.body)
                .map_err(|error| SourceError::invalid_payload(error.to_string()))?;
            payloads
                .into_iter()
                .map(|payload| payload.into_bar(&query.code))
                .collect()
        })
    }
}

fn format_compact(date: Date) -> Result<String, SourceError> {
    date.format(COMPACT_DATE)
        .map_err(|error| SourceError::internal(error.to_string()))
}
