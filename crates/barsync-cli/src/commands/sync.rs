//! `sync` command: run one batch against the configured provider.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use barsync_core::http_client::ReqwestHttpClient;
use barsync_core::{
    CancelFlag, InstrumentCode, RestSource, RestSourceConfig, SourceQuota, SyncEngine,
    SyncOptions, SyncRepository, TradingCalendar, Warehouse,
};
use tracing::info;

use crate::cli::SyncArgs;
use crate::error::CliError;

pub async fn run(warehouse: Warehouse, args: SyncArgs) -> Result<ExitCode, CliError> {
    let codes = resolve_codes(&warehouse, &args.codes)?;
    let quota = SourceQuota::new(
        args.quota_limit,
        Duration::from_secs(args.quota_window_secs),
        args.max_span_days,
    );
    let source = build_source(&args, quota)?;

    let cancel = CancelFlag::new();
    spawn_ctrl_c_handler(cancel.clone());

    let options = SyncOptions {
        force: args.force,
        test_mode: args.test_mode,
        on_progress: Some(Box::new(|completed, total, code| {
            eprintln!("[{completed}/{total}] {code}");
        })),
        cancel,
    };

    let engine = SyncEngine::new(
        Arc::new(warehouse),
        Arc::new(source),
        TradingCalendar::krx(),
    );
    let report = engine.sync_batch(codes, options).await?;

    println!("batch {}", report.batch_id);
    println!(
        "  new: {}  updated: {}  skipped: {}  failed: {}",
        report.succeeded,
        report.updated,
        report.skipped,
        report.failed()
    );
    println!(
        "  bars merged: {}  elapsed: {:.1}s",
        report.records_merged,
        report.elapsed.as_secs_f64()
    );
    if report.cancelled {
        println!("  cancelled before completion");
    }
    for failure in &report.failures {
        println!("  failed {}: {}", failure.code, failure.error);
    }

    if report.all_failed() {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}

fn resolve_codes(
    warehouse: &Warehouse,
    requested: &[String],
) -> Result<Vec<InstrumentCode>, CliError> {
    if requested.is_empty() {
        let tracked: Vec<InstrumentCode> = warehouse
            .list_tracked()
            .map_err(|error| CliError::Command(error.to_string()))?
            .into_iter()
            .filter(|instrument| instrument.is_active)
            .map(|instrument| instrument.code)
            .collect();
        if tracked.is_empty() {
            return Err(CliError::Command(
                "no tracked instruments; pass codes or run 'barsync track' first".to_string(),
            ));
        }
        return Ok(tracked);
    }

    requested
        .iter()
        .map(|code| Ok(InstrumentCode::parse(code)?))
        .collect()
}

fn build_source(args: &SyncArgs, quota: SourceQuota) -> Result<RestSource, CliError> {
    let config = match &args.source_url {
        Some(url) => RestSourceConfig::new(url.clone(), quota),
        None => RestSourceConfig::from_env(quota)
            .map_err(|error| CliError::Command(error.to_string()))?,
    };
    let http = ReqwestHttpClient::new().map_err(|error| CliError::Command(error.to_string()))?;
    Ok(RestSource::new(config, Arc::new(http)))
}

fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing in-flight fetches");
            cancel.cancel();
        }
    });
}
