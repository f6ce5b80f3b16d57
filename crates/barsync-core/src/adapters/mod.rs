//! Source adapter implementations.

mod rest;

pub use rest::{RestSource, RestSourceConfig};
