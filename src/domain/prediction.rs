//! Per-instrument prediction runner.
//!
//! Applies a loaded [`StrategyFn`] to every instrument in a batch. The batch
//! is fail-fast: one instrument whose function faults or whose first score
//! cannot be coerced to a finite float aborts the whole batch. This is the
//! opposite of reconciliation, which skips bad records one at a time.

use serde::{Deserialize, Serialize};

use crate::domain::error::SiglabError;
use crate::domain::loader::StrategyFn;
use crate::domain::market::{group_by_instrument, MarketRow};
use crate::domain::script::Value;

/// One submitted prediction. Field names match the submission file columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    #[serde(rename = "id")]
    pub instrument_id: String,
    #[serde(rename = "predictions")]
    pub prediction_value: f64,
    #[serde(rename = "round_no")]
    pub round_number: u32,
}

/// Numbers pass through, booleans become 1/0; anything else, or a
/// non-finite number, is rejected.
pub fn coerce_score(value: &Value) -> Result<f64, String> {
    let score = match value {
        Value::Number(n) => *n,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => return Err(format!("score must be a number, got {}", other.type_name())),
    };
    if !score.is_finite() {
        return Err(format!("score must be finite, got {}", score));
    }
    Ok(score)
}

/// Run `strategy` once per distinct instrument in `rows`.
///
/// Rows must already be time-ordered; each instrument sees its full history.
/// Only the first (5-period) score is kept.
pub fn run_predictions(
    rows: &[MarketRow],
    round_number: u32,
    strategy: &StrategyFn,
) -> Result<Vec<PredictionRow>, SiglabError> {
    run_predictions_with_config(rows, round_number, strategy, None)
}

/// As [`run_predictions`], overriding the function's config parameter.
pub fn run_predictions_with_config(
    rows: &[MarketRow],
    round_number: u32,
    strategy: &StrategyFn,
    config: Option<f64>,
) -> Result<Vec<PredictionRow>, SiglabError> {
    let groups = group_by_instrument(rows);
    let mut predictions = Vec::with_capacity(groups.len());

    for (instrument, history) in &groups {
        let (score_5, _score_10) =
            strategy
                .invoke(history, config)
                .map_err(|e| SiglabError::Prediction {
                    instrument: instrument.to_string(),
                    reason: e.to_string(),
                })?;

        let prediction_value = coerce_score(&score_5).map_err(|reason| SiglabError::Prediction {
            instrument: instrument.to_string(),
            reason,
        })?;

        predictions.push(PredictionRow {
            instrument_id: instrument.to_string(),
            prediction_value,
            round_number,
        });
    }

    tracing::debug!(
        function = strategy.name(),
        instruments = predictions.len(),
        round = round_number,
        "predictions computed"
    );
    Ok(predictions)
}
