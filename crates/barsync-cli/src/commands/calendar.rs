//! `calendar` command: session date and upcoming trading days.

use std::process::ExitCode;

use barsync_core::TradingCalendar;
use time::OffsetDateTime;

use crate::cli::CalendarArgs;
use crate::error::CliError;

pub fn run(args: &CalendarArgs) -> Result<ExitCode, CliError> {
    let calendar = TradingCalendar::krx();
    let now = OffsetDateTime::now_utc();

    let session = calendar.market_today(now);
    println!("session date: {session}");
    println!("latest trading day: {}", calendar.last_trading_day(session));

    println!();
    let mut day = session;
    for _ in 0..args.days {
        let label = if calendar.is_trading_day(day) {
            "trading"
        } else {
            "closed"
        };
        println!("  {day}  {label}");
        day = TradingCalendar::add_days(day, 1);
    }

    Ok(ExitCode::SUCCESS)
}
