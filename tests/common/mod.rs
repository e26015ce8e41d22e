#![allow(dead_code)]

use chrono::NaiveDate;
use serde_json::json;
use siglab::adapters::submission::read_submission;
use siglab::domain::error::SiglabError;
use siglab::domain::market::MarketRow;
use siglab::domain::prediction::PredictionRow;
use siglab::ports::gateway_port::{
    BacktestResults, StrategyCallback, SubmissionStatus, TradeEventBundle, TradingGateway,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

pub const EMA_STRATEGY: &str = "\
def ema_signal(df, span = 3) {
    let current = df[-1];
    let score_5 = 0;
    let score_10 = 0;
    if current.close > ema(df.close, span) {
        score_5 = 0.5;
        score_10 = 0.25;
    } else {
        score_5 = -0.5;
    }
    return score_5, score_10;
}
";

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_row(id: &str, period: i64, close: f64) -> MarketRow {
    MarketRow::new(id, period)
        .with_value("open", close - 0.5)
        .with_value("high", close + 1.0)
        .with_value("low", close - 1.0)
        .with_value("close", close)
}

/// `n` rows starting at period 1 with close `start + step * (period - 1)`.
pub fn trending_rows(id: &str, n: i64, start: f64, step: f64) -> Vec<MarketRow> {
    (1..=n)
        .map(|p| make_row(id, p, start + step * (p - 1) as f64))
        .collect()
}

/// Backtest results for one instrument on one date.
pub fn single_result(instrument: &str, on: NaiveDate, bundle: TradeEventBundle) -> BacktestResults {
    let mut results = BTreeMap::new();
    results.insert(instrument.to_string(), BTreeMap::from([(on, bundle)]));
    results
}

/// The three-trade example: t1 matched, t2 action only, t3 reward only.
pub fn t1_t2_t3_bundle() -> TradeEventBundle {
    TradeEventBundle {
        actions: vec![json!([1, "t1", 0, 0]), json!([-1, "t2", 0, 0])],
        rewards: vec![json!(["t1", 0.05, 3]), json!(["t3", 0.02, 4])],
        total_return: 0.05,
    }
}

pub struct MockGateway {
    pub validation: HashMap<NaiveDate, Vec<MarketRow>>,
    pub live: HashMap<String, Vec<MarketRow>>,
    pub round: Result<u32, String>,
    pub results: Option<BacktestResults>,
    pub backtest_error: Option<String>,
    pub submitted: Mutex<Vec<Vec<PredictionRow>>>,
    pub strategy_calls: Mutex<usize>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            validation: HashMap::new(),
            live: HashMap::new(),
            round: Ok(1),
            results: None,
            backtest_error: None,
            submitted: Mutex::new(Vec::new()),
            strategy_calls: Mutex::new(0),
        }
    }

    pub fn with_validation(mut self, on: NaiveDate, rows: Vec<MarketRow>) -> Self {
        self.validation.entry(on).or_default().extend(rows);
        self
    }

    pub fn with_data(mut self, kind: &str, rows: Vec<MarketRow>) -> Self {
        self.live.entry(kind.to_string()).or_default().extend(rows);
        self
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Ok(round);
        self
    }

    pub fn with_round_error(mut self, reason: &str) -> Self {
        self.round = Err(reason.to_string());
        self
    }

    pub fn with_results(mut self, results: BacktestResults) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_backtest_error(mut self, reason: &str) -> Self {
        self.backtest_error = Some(reason.to_string());
        self
    }

    pub fn submissions(&self) -> Vec<Vec<PredictionRow>> {
        self.submitted.lock().unwrap().clone()
    }
}

impl TradingGateway for MockGateway {
    fn fetch_validation_data(&self, on: NaiveDate) -> Result<Vec<MarketRow>, SiglabError> {
        self.validation
            .get(&on)
            .cloned()
            .ok_or_else(|| SiglabError::gateway(format!("no validation data for {}", on)))
    }

    fn get_current_round(&self) -> Result<u32, SiglabError> {
        self.round.clone().map_err(SiglabError::gateway)
    }

    fn get_data(&self, kind: &str) -> Result<Vec<MarketRow>, SiglabError> {
        self.live
            .get(kind)
            .cloned()
            .ok_or_else(|| SiglabError::gateway(format!("no data of kind {}", kind)))
    }

    fn submit_predictions(&self, path: &Path) -> Result<SubmissionStatus, SiglabError> {
        let rows = read_submission(path)?;
        let count = rows.len();
        self.submitted.lock().unwrap().push(rows);
        Ok(SubmissionStatus {
            accepted: true,
            rows: count,
            stored_as: Some(format!("mock/{}", path.display())),
        })
    }

    /// Scores every instrument's full validation history once, then returns
    /// the canned results.
    fn run_backtest(
        &self,
        strategy: StrategyCallback<'_>,
        on: NaiveDate,
        _result_type: &str,
    ) -> Result<BacktestResults, SiglabError> {
        if let Some(reason) = &self.backtest_error {
            return Err(SiglabError::gateway(reason.clone()));
        }
        let rows = self.fetch_validation_data(on)?;
        let mut by_instrument: BTreeMap<&str, Vec<MarketRow>> = BTreeMap::new();
        for row in &rows {
            by_instrument
                .entry(row.instrument_id.as_str())
                .or_default()
                .push(row.clone());
        }
        for history in by_instrument.values() {
            strategy(history)?;
            *self.strategy_calls.lock().unwrap() += 1;
        }
        Ok(self.results.clone().unwrap_or_default())
    }
}
