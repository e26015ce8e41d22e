//! siglab: run submitted trading-signal functions against market data and
//! reconcile the resulting trades.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`pipeline`] wires them together
//! for the CLI and the HTTP service.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod pipeline;
pub mod ports;
