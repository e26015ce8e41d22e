//! Directory-backed trading gateway.
//!
//! Layout under `data_dir`:
//!
//! ```text
//! {kind}.csv                   live data for get_data(kind)
//! validation/YYYY-MM-DD.csv    historical data for backtests
//! round.json                   {"round_no": N} or {"error": "..."}
//! ```
//!
//! Backtests are simulated locally: each period with a successor is scored
//! from the history up to it and held for one period.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value as Json};

use crate::adapters::submission::read_submission;
use crate::domain::config_validation::{GatewaySettings, SUPPORTED_RESULT_TYPES};
use crate::domain::error::SiglabError;
use crate::domain::market::{group_by_instrument, MarketRow};
use crate::ports::gateway_port::{
    check_error_indicator, BacktestResults, StrategyCallback, SubmissionStatus, TradeEventBundle,
    TradingGateway,
};

const ID_COLUMN: &str = "id";
const PERIOD_COLUMN: &str = "row_num";

pub struct FileGateway {
    data_dir: PathBuf,
    submissions_dir: PathBuf,
}

impl FileGateway {
    pub fn new(data_dir: impl Into<PathBuf>, submissions_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            submissions_dir: submissions_dir.into(),
        }
    }

    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self::new(&settings.data_dir, &settings.submissions_dir)
    }

    fn validation_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join("validation")
            .join(format!("{}.csv", date.format("%Y-%m-%d")))
    }

    fn read_json(&self, path: &Path) -> Result<Json, SiglabError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SiglabError::gateway(format!("failed to read {}: {}", path.display(), e))
        })?;
        let payload: Json = serde_json::from_str(&content).map_err(|e| {
            SiglabError::gateway(format!("invalid JSON in {}: {}", path.display(), e))
        })?;
        check_error_indicator(&payload)?;
        Ok(payload)
    }
}

fn parse_period(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        let f: f64 = value.parse().ok()?;
        (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
    })
}

/// Read a market data CSV: `id` and `row_num` columns plus any number of
/// numeric value columns. Empty cells are left out of the row, and an
/// `(id, row_num)` pair may appear only once.
pub fn read_market_csv(path: &Path) -> Result<Vec<MarketRow>, SiglabError> {
    let content = fs::read_to_string(path)
        .map_err(|e| SiglabError::gateway(format!("failed to read {}: {}", path.display(), e)))?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| SiglabError::gateway(format!("CSV parse error: {}", e)))?
        .clone();

    let column = |name: &str| {
        headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
            SiglabError::gateway(format!("{}: missing '{}' column", path.display(), name))
        })
    };
    let id_idx = column(ID_COLUMN)?;
    let period_idx = column(PERIOD_COLUMN)?;

    let mut rows = Vec::new();
    let mut seen: HashMap<(String, i64), usize> = HashMap::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| SiglabError::gateway(format!("CSV parse error: {}", e)))?;
        let line = line + 2;

        let id = record.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            return Err(SiglabError::gateway(format!(
                "{}:{}: empty instrument id",
                path.display(),
                line
            )));
        }
        let period_str = record.get(period_idx).unwrap_or("");
        let period = parse_period(period_str).ok_or_else(|| {
            SiglabError::gateway(format!(
                "{}:{}: invalid row_num '{}'",
                path.display(),
                line,
                period_str
            ))
        })?;
        if let Some(first) = seen.insert((id.to_string(), period), line) {
            return Err(SiglabError::gateway(format!(
                "{}:{}: duplicate row for '{}' at row_num {} (first on line {})",
                path.display(),
                line,
                id,
                period,
                first
            )));
        }

        let mut row = MarketRow::new(id, period);
        for (idx, (name, cell)) in headers.iter().zip(record.iter()).enumerate() {
            if idx == id_idx || idx == period_idx || cell.trim().is_empty() {
                continue;
            }
            let value: f64 = cell.trim().parse().map_err(|_| {
                SiglabError::gateway(format!(
                    "{}:{}: invalid value '{}' in column '{}'",
                    path.display(),
                    line,
                    cell,
                    name
                ))
            })?;
            row.values.insert(name.trim().to_string(), value);
        }
        rows.push(row);
    }

    rows.sort_by(|a, b| {
        a.instrument_id
            .cmp(&b.instrument_id)
            .then(a.period_index.cmp(&b.period_index))
    });
    Ok(rows)
}

/// Hold each scored period for one period. Returns the bundle for one
/// instrument's history.
fn simulate_instrument(
    instrument: &str,
    history: &[MarketRow],
    strategy: StrategyCallback<'_>,
) -> Result<TradeEventBundle, SiglabError> {
    let mut bundle = TradeEventBundle::default();
    let mut growth = 1.0;

    for i in 0..history.len().saturating_sub(1) {
        let (Some(entry), Some(exit)) = (history[i].close(), history[i + 1].close()) else {
            continue;
        };
        if entry == 0.0 {
            continue;
        }

        let score = strategy(&history[..=i])?;
        let action: i64 = if score > 0.0 {
            1
        } else if score < 0.0 {
            -1
        } else {
            continue;
        };

        let period = history[i].period_index;
        let trade_id = format!("{}-{}", instrument, period);
        let reward = action as f64 * (exit - entry) / entry;
        growth *= 1.0 + reward;

        bundle.actions.push(json!([action, trade_id, entry, score]));
        bundle.rewards.push(json!([trade_id, reward, period]));
    }

    bundle.total_return = growth - 1.0;
    Ok(bundle)
}

impl TradingGateway for FileGateway {
    fn fetch_validation_data(&self, date: NaiveDate) -> Result<Vec<MarketRow>, SiglabError> {
        let rows = read_market_csv(&self.validation_path(date))?;
        tracing::debug!(%date, rows = rows.len(), "validation data loaded");
        Ok(rows)
    }

    fn get_current_round(&self) -> Result<u32, SiglabError> {
        let path = self.data_dir.join("round.json");
        let payload = self.read_json(&path)?;
        payload
            .get("round_no")
            .and_then(Json::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| SiglabError::gateway(format!("{}: missing or invalid round_no", path.display())))
    }

    fn get_data(&self, kind: &str) -> Result<Vec<MarketRow>, SiglabError> {
        let rows = read_market_csv(&self.data_dir.join(format!("{}.csv", kind)))?;
        tracing::debug!(kind, rows = rows.len(), "live data loaded");
        Ok(rows)
    }

    fn submit_predictions(&self, path: &Path) -> Result<SubmissionStatus, SiglabError> {
        let rows = read_submission(path)?;
        let round = self.get_current_round()?;

        if let Some(stale) = rows.iter().find(|r| r.round_number != round) {
            tracing::warn!(
                submitted = stale.round_number,
                current = round,
                "submission rejected: round mismatch"
            );
            return Ok(SubmissionStatus {
                accepted: false,
                rows: rows.len(),
                stored_as: None,
            });
        }

        fs::create_dir_all(&self.submissions_dir)?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let target = self
            .submissions_dir
            .join(format!("round_{}_{}.csv", round, stamp));
        fs::copy(path, &target)?;

        Ok(SubmissionStatus {
            accepted: true,
            rows: rows.len(),
            stored_as: Some(target.display().to_string()),
        })
    }

    fn run_backtest(
        &self,
        strategy: StrategyCallback<'_>,
        date: NaiveDate,
        result_type: &str,
    ) -> Result<BacktestResults, SiglabError> {
        if !SUPPORTED_RESULT_TYPES.contains(&result_type) {
            return Err(SiglabError::gateway(format!(
                "unsupported result type '{}'",
                result_type
            )));
        }

        let rows = self.fetch_validation_data(date)?;
        let mut results = BTreeMap::new();
        for (instrument, history) in group_by_instrument(&rows) {
            let bundle = simulate_instrument(instrument, &history, strategy)?;
            tracing::debug!(
                instrument,
                trades = bundle.actions.len(),
                total_return = bundle.total_return,
                "instrument simulated"
            );
            results.insert(instrument.to_string(), BTreeMap::from([(date, bundle)]));
        }
        Ok(results)
    }
}
