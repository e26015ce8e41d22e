//! Trading platform gateway port: market data in, predictions out, and
//! backtests run on the platform's side.

use crate::domain::error::SiglabError;
use crate::domain::market::MarketRow;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;

/// Scores the latest row of an instrument's history. Called by the gateway
/// once per simulated period during a backtest.
pub type StrategyCallback<'a> = &'a (dyn Fn(&[MarketRow]) -> Result<f64, SiglabError> + Sync);

/// Raw action and reward logs for one instrument on one date, plus the
/// gateway's own total return.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeEventBundle {
    pub actions: Vec<Json>,
    pub rewards: Vec<Json>,
    pub total_return: f64,
}

/// instrument → date → events
pub type BacktestResults = BTreeMap<String, BTreeMap<NaiveDate, TradeEventBundle>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionStatus {
    pub accepted: bool,
    pub rows: usize,
    pub stored_as: Option<String>,
}

pub trait TradingGateway {
    fn fetch_validation_data(&self, date: NaiveDate) -> Result<Vec<MarketRow>, SiglabError>;

    fn get_current_round(&self) -> Result<u32, SiglabError>;

    fn get_data(&self, kind: &str) -> Result<Vec<MarketRow>, SiglabError>;

    fn submit_predictions(&self, path: &Path) -> Result<SubmissionStatus, SiglabError>;

    fn run_backtest(
        &self,
        strategy: StrategyCallback<'_>,
        date: NaiveDate,
        result_type: &str,
    ) -> Result<BacktestResults, SiglabError>;
}

/// Reject payloads that carry an `{"error": ...}` indicator in place of data.
pub fn check_error_indicator(payload: &Json) -> Result<(), SiglabError> {
    let Some(indicator) = payload.as_object().and_then(|o| o.get("error")) else {
        return Ok(());
    };
    let message = match indicator {
        Json::Null => return Ok(()),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    };
    Err(SiglabError::gateway(message))
}
