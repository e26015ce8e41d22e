//! Backtest report assembly.

use serde::Serialize;

use crate::domain::indicator;
use crate::domain::market::MarketRow;
use crate::domain::reconcile::{TradeRecord, TradeType};

pub const DEFAULT_SMA_SHORT: usize = 10;
pub const DEFAULT_SMA_LONG: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_trades: usize,
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub total_return: f64,
}

/// One period of raw price data plus the two moving averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub period: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IndicatorSeries {
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Build the series for one instrument's time-ordered rows.
    ///
    /// A precomputed `SMA_{n}` column is used when the data carries one;
    /// otherwise the average is computed from close.
    pub fn from_rows(rows: &[MarketRow], sma_short: usize, sma_long: usize) -> Self {
        let closes: Vec<f64> = rows.iter().map(|r| r.close().unwrap_or(f64::NAN)).collect();
        let short = moving_average(rows, &closes, sma_short);
        let long = moving_average(rows, &closes, sma_long);

        let points = rows
            .iter()
            .zip(short.into_iter().zip(long))
            .map(|(row, (sma_short, sma_long))| IndicatorPoint {
                period: row.period_index,
                open: row.open(),
                high: row.high(),
                low: row.low(),
                close: row.close(),
                sma_short,
                sma_long,
            })
            .collect();
        IndicatorSeries { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn moving_average(rows: &[MarketRow], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let column = format!("SMA_{}", period);
    if rows.iter().any(|r| r.value(&column).is_some()) {
        return rows.iter().map(|r| r.value(&column)).collect();
    }
    indicator::sma(closes, period)
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub trades: Vec<TradeRecord>,
    pub summary: Summary,
    pub indicators: IndicatorSeries,
}

/// Combine reconciled trades, the gateway's total return and the indicator
/// series into one report. `total_return` is passed through untouched.
pub fn assemble(trades: Vec<TradeRecord>, indicators: IndicatorSeries, total_return: f64) -> BacktestReport {
    let buy_trades = trades.iter().filter(|t| t.trade_type == TradeType::Buy).count();
    let summary = Summary {
        total_trades: trades.len(),
        buy_trades,
        sell_trades: trades.len() - buy_trades,
        total_return,
    };
    BacktestReport {
        trades,
        summary,
        indicators,
    }
}
