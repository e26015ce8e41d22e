//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod events;
pub mod indicator;
pub mod loader;
pub mod market;
pub mod prediction;
pub mod reconcile;
pub mod report;
pub mod script;
pub mod template;
