//! `track` command: register instruments for syncing.

use std::process::ExitCode;

use barsync_core::{Instrument, InstrumentCode, Market, SyncRepository, Warehouse};

use crate::cli::TrackArgs;
use crate::error::CliError;

pub fn run(warehouse: &Warehouse, args: &TrackArgs) -> Result<ExitCode, CliError> {
    let market = args.market.as_deref().map(Market::parse).transpose()?;

    for raw in &args.codes {
        let code = InstrumentCode::parse(raw)?;
        // Names come from provider metadata later; the code stands in until
        // then.
        let instrument = Instrument::new(code.clone(), code.as_str(), market);
        SyncRepository::ensure_tracked(warehouse, &instrument)
            .map_err(|error| CliError::Command(error.to_string()))?;
        println!("tracking {code}");
    }

    Ok(ExitCode::SUCCESS)
}
