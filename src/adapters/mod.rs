//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod file_gateway;
pub mod submission;
#[cfg(feature = "web")]
pub mod web;
