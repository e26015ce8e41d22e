//! Configuration validation.
//!
//! Each section is validated and turned into a typed settings struct before
//! any data is read or any submitted code is run.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::error::SiglabError;
use crate::domain::report::{DEFAULT_SMA_LONG, DEFAULT_SMA_SHORT};
use crate::ports::config_port::ConfigPort;

/// Result types the local backtest can produce.
pub const SUPPORTED_RESULT_TYPES: &[&str] = &["returns"];

const DEFAULT_DATA_KIND: &str = "round";
const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: i64 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    pub data_dir: PathBuf,
    pub submissions_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub date: NaiveDate,
    pub instrument: String,
    pub result_type: String,
    pub sma_short: usize,
    pub sma_long: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictSettings {
    pub data_kind: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SiglabError {
    SiglabError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SiglabError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SiglabError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Parse a `YYYY-MM-DD` date reported against `[section] key`.
pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, SiglabError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(section, key, format!("invalid {} format, expected YYYY-MM-DD", key)))
}

fn positive_period(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, SiglabError> {
    let value = config.get_int("backtest", key, default as i64);
    if value <= 0 {
        return Err(invalid("backtest", key, format!("{} must be positive", key)));
    }
    Ok(value as usize)
}

pub fn gateway_settings(config: &dyn ConfigPort) -> Result<GatewaySettings, SiglabError> {
    let data_dir = PathBuf::from(required(config, "gateway", "data_dir")?);
    let submissions_dir = config
        .get_string("gateway", "submissions_dir")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .unwrap_or_else(|| data_dir.join("submissions"));
    Ok(GatewaySettings {
        data_dir,
        submissions_dir,
    })
}

/// Backtest settings; `instrument` and `date` overrides (from the command
/// line or a request body) take precedence over the file.
pub fn backtest_settings(
    config: &dyn ConfigPort,
    instrument: Option<&str>,
    date: Option<&str>,
) -> Result<BacktestSettings, SiglabError> {
    let date = match date {
        Some(d) => parse_date(d, "backtest", "date")?,
        None => parse_date(&required(config, "backtest", "date")?, "backtest", "date")?,
    };

    let instrument = match instrument.map(str::trim) {
        Some(i) if !i.is_empty() => i.to_string(),
        Some(_) => return Err(invalid("backtest", "instrument", "instrument must not be empty")),
        None => required(config, "backtest", "instrument")?,
    };

    let result_type = config
        .get_string("backtest", "result_type")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| SUPPORTED_RESULT_TYPES[0].to_string());
    if !SUPPORTED_RESULT_TYPES.contains(&result_type.as_str()) {
        return Err(invalid(
            "backtest",
            "result_type",
            format!("unsupported result_type '{}', expected one of {:?}", result_type, SUPPORTED_RESULT_TYPES),
        ));
    }

    let sma_short = positive_period(config, "sma_short", DEFAULT_SMA_SHORT)?;
    let sma_long = positive_period(config, "sma_long", DEFAULT_SMA_LONG)?;

    Ok(BacktestSettings {
        date,
        instrument,
        result_type,
        sma_short,
        sma_long,
    })
}

pub fn predict_settings(config: &dyn ConfigPort) -> Result<PredictSettings, SiglabError> {
    let data_kind = config
        .get_string("predict", "data_kind")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_DATA_KIND.to_string());
    let valid = !data_kind.is_empty()
        && data_kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(invalid(
            "predict",
            "data_kind",
            "data_kind must be a plain name (letters, digits, '_' or '-')",
        ));
    }
    Ok(PredictSettings {
        data_kind,
        dry_run: config.get_bool("predict", "dry_run", false),
    })
}

pub fn server_settings(config: &dyn ConfigPort) -> Result<ServerSettings, SiglabError> {
    let bind = config
        .get_string("server", "bind")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let port = config.get_int("server", "port", DEFAULT_PORT);
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| invalid("server", "port", "port must be between 1 and 65535"))?;
    Ok(ServerSettings { bind, port })
}
