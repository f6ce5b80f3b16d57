//! `status` command: warehouse counts and per-instrument freshness.

use std::process::ExitCode;

use barsync_core::Warehouse;

use crate::error::CliError;

pub fn run(warehouse: &Warehouse) -> Result<ExitCode, CliError> {
    let summary = warehouse.status()?;

    println!("warehouse: {}", warehouse.db_path().display());
    println!("  instruments: {}", summary.instrument_count);
    println!("  daily bars:  {}", summary.bar_count);
    match summary.latest_bar_date {
        Some(date) => println!("  latest bar:  {date}"),
        None => println!("  latest bar:  none"),
    }

    let instruments = warehouse.list_instruments()?;
    if !instruments.is_empty() {
        println!();
        for row in instruments {
            let synced = row
                .last_synced_date
                .map_or_else(|| "never".to_string(), |date| date.to_string());
            let market = row.market.as_deref().unwrap_or("-");
            println!("  {}  {:<8} synced through {synced}", row.code, market);
        }
    }

    Ok(ExitCode::SUCCESS)
}
