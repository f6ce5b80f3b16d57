//! Command dispatch.

mod calendar;
mod status;
mod sync;
mod track;

use std::process::ExitCode;

use barsync_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Command::Sync(args) => sync::run(open_warehouse(&cli.db_path)?, args).await,
        Command::Track(args) => track::run(&open_warehouse(&cli.db_path)?, &args),
        Command::Status => status::run(&open_warehouse(&cli.db_path)?),
        Command::Calendar(args) => calendar::run(&args),
    }
}

fn open_warehouse(db_path: &Option<std::path::PathBuf>) -> Result<Warehouse, CliError> {
    let config = match db_path {
        Some(path) => WarehouseConfig {
            db_path: path.clone(),
            ..WarehouseConfig::default()
        },
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}
