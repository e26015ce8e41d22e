//! End-to-end flows shared by the CLI and the HTTP service.
//!
//! Every call loads the submitted source afresh; nothing survives between
//! calls except the gateway itself.

use chrono::NaiveDate;
use serde::Serialize;

use crate::adapters::submission;
use crate::domain::config_validation::{BacktestSettings, PredictSettings};
use crate::domain::error::SiglabError;
use crate::domain::loader::{load_strategy, StrategyFn};
use crate::domain::market::{close_series, MarketRow};
use crate::domain::prediction::{coerce_score, run_predictions, PredictionRow};
use crate::domain::reconcile::reconcile;
use crate::domain::report::{assemble, BacktestReport, IndicatorSeries};
use crate::ports::gateway_port::{SubmissionStatus, TradingGateway};

#[derive(Debug, Clone, Serialize)]
pub struct BacktestOutcome {
    pub instrument: String,
    pub date: NaiveDate,
    pub function: String,
    #[serde(flatten)]
    pub report: BacktestReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictOutcome {
    pub round_no: u32,
    pub rows: usize,
    pub status: Option<SubmissionStatus>,
    #[serde(skip)]
    pub predictions: Vec<PredictionRow>,
}

/// Score the latest row of one history slice with the 5-period score.
fn score_latest(strategy: &StrategyFn, history: &[MarketRow]) -> Result<f64, SiglabError> {
    let instrument = history
        .first()
        .map(|r| r.instrument_id.clone())
        .unwrap_or_default();
    let (score_5, _) = strategy
        .invoke(history, None)
        .map_err(|e| SiglabError::Prediction {
            instrument: instrument.clone(),
            reason: e.to_string(),
        })?;
    coerce_score(&score_5).map_err(|reason| SiglabError::Prediction { instrument, reason })
}

/// Load `source`, have the gateway backtest it, and report on one instrument.
pub fn backtest(
    gateway: &dyn TradingGateway,
    source: &str,
    settings: &BacktestSettings,
) -> Result<BacktestOutcome, SiglabError> {
    let strategy = load_strategy(source)?;
    tracing::info!(function = strategy.name(), date = %settings.date, "running backtest");

    let callback = |history: &[MarketRow]| score_latest(&strategy, history);
    let results = gateway.run_backtest(&callback, settings.date, &settings.result_type)?;

    let bundle = results
        .get(&settings.instrument)
        .and_then(|by_date| by_date.get(&settings.date))
        .ok_or_else(|| SiglabError::NoInstrument {
            instrument: settings.instrument.clone(),
        })?;

    let rows: Vec<MarketRow> = gateway
        .fetch_validation_data(settings.date)?
        .into_iter()
        .filter(|r| r.instrument_id == settings.instrument)
        .collect();
    let prices = close_series(&rows, &settings.instrument);
    let indicators = IndicatorSeries::from_rows(&rows, settings.sma_short, settings.sma_long);

    let trades = reconcile(&bundle.actions, &bundle.rewards, &prices);
    tracing::info!(
        instrument = %settings.instrument,
        actions = bundle.actions.len(),
        rewards = bundle.rewards.len(),
        trades = trades.len(),
        "trades reconciled"
    );

    Ok(BacktestOutcome {
        instrument: settings.instrument.clone(),
        date: settings.date,
        function: strategy.name().to_string(),
        report: assemble(trades, indicators, bundle.total_return),
    })
}

/// Compute this round's predictions without submitting them.
pub fn predict(
    gateway: &dyn TradingGateway,
    source: &str,
    settings: &PredictSettings,
) -> Result<PredictOutcome, SiglabError> {
    let strategy = load_strategy(source)?;
    let round_no = gateway.get_current_round()?;
    let rows = gateway.get_data(&settings.data_kind)?;
    tracing::info!(function = strategy.name(), round = round_no, rows = rows.len(), "computing predictions");

    let predictions = run_predictions(&rows, round_no, &strategy)?;
    Ok(PredictOutcome {
        round_no,
        rows: predictions.len(),
        status: None,
        predictions,
    })
}

/// Compute this round's predictions and submit them through the gateway.
pub fn predict_and_submit(
    gateway: &dyn TradingGateway,
    source: &str,
    settings: &PredictSettings,
) -> Result<PredictOutcome, SiglabError> {
    let mut outcome = predict(gateway, source, settings)?;
    outcome.status = Some(submission::submit(gateway, &outcome.predictions)?);
    Ok(outcome)
}

/// Load `source` and return the function's name.
pub fn validate(source: &str) -> Result<String, SiglabError> {
    Ok(load_strategy(source)?.name().to_string())
}
