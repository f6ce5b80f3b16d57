//! # barsync Core
//!
//! Calendar-aware, rate-limited synchronization of daily market bars.
//!
//! ## Overview
//!
//! This crate provides the building blocks of the barsync collector:
//!
//! - **Domain models** for instruments and daily bars
//! - **Trading calendar** with exchange holidays and the 09:00 session open
//! - **Staleness policy** deciding how far back each instrument must fetch
//! - **Rate-limited fetch scheduler** with window chunking
//! - **Batch sync engine** with progress and cooperative cancellation
//! - **Storage seam** over the `DuckDB` warehouse
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Source adapter implementations |
//! | [`calendar`] | Trading-day calendar |
//! | [`domain`] | Domain models (`InstrumentCode`, `DailyBar`, `Market`) |
//! | [`error`] | Batch-level and record-level error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`policy`] | Staleness policy and fetch windows |
//! | [`repository`] | Storage trait and warehouse implementation |
//! | [`scheduler`] | Rate-limited concurrent fetching |
//! | [`source`] | Market source trait and quota types |
//! | [`sync`] | Batch orchestration |
//! | [`throttle`] | Quota enforcement |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use barsync_core::{
//!     InstrumentCode, RestSource, RestSourceConfig, SourceQuota, SyncEngine,
//!     SyncOptions, TradingCalendar,
//! };
//! use barsync_core::http_client::ReqwestHttpClient;
//! use barsync_warehouse::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let quota = SourceQuota::new(100, std::time::Duration::from_secs(60), 120);
//!     let source = RestSource::new(
//!         RestSourceConfig::from_env(quota)?,
//!         Arc::new(ReqwestHttpClient::new()?),
//!     );
//!
//!     let engine = SyncEngine::new(
//!         Arc::new(warehouse),
//!         Arc::new(source),
//!         TradingCalendar::krx(),
//!     );
//!     let report = engine
//!         .sync_batch(vec![InstrumentCode::parse("005930")?], SyncOptions::default())
//!         .await?;
//!     println!("merged {} bars", report.records_merged);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod calendar;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod policy;
pub mod repository;
pub mod scheduler;
pub mod source;
pub mod sync;
pub mod throttle;

pub use adapters::{RestSource, RestSourceConfig};
pub use calendar::TradingCalendar;
pub use domain::{merge_by_date, DailyBar, Instrument, InstrumentCode, Market};
pub use error::{SyncError, ValidationError};
pub use policy::{SyncPlanner, SyncReason, SyncWindow, FAR_PAST};
pub use repository::SyncRepository;
pub use scheduler::{FetchOutcome, FetchScheduler};
pub use source::{BarsQuery, MarketSource, SourceError, SourceErrorKind, SourceQuota};
pub use sync::{
    BatchReport, CancelFlag, FailedSync, SyncEngine, SyncOptions, TEST_MODE_CAP,
};
pub use throttle::RateGate;

pub use barsync_warehouse::{StatusSummary, Warehouse, WarehouseConfig, WarehouseError};
