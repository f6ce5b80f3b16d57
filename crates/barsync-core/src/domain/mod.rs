//! Domain types shared across the sync engine.

mod code;
mod models;

pub use code::InstrumentCode;
pub use models::{merge_by_date, DailyBar, Instrument, Market};
