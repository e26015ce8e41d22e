//! Market observation rows and per-instrument views.

use std::collections::{BTreeMap, HashMap};

/// One observation for one instrument at one period.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    pub instrument_id: String,
    pub period_index: i64,
    pub values: BTreeMap<String, f64>,
}

impl MarketRow {
    pub fn new(instrument_id: impl Into<String>, period_index: i64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            period_index,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn open(&self) -> Option<f64> {
        self.value("open")
    }

    pub fn high(&self) -> Option<f64> {
        self.value("high")
    }

    pub fn low(&self) -> Option<f64> {
        self.value("low")
    }

    pub fn close(&self) -> Option<f64> {
        self.value("close")
    }
}

/// Group rows by instrument, keeping instruments in first-appearance order and
/// each group's rows in their original relative order.
pub fn group_by_instrument(rows: &[MarketRow]) -> Vec<(&str, Vec<MarketRow>)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<MarketRow>)> = Vec::new();

    for row in rows {
        let id = row.instrument_id.as_str();
        match positions.get(id) {
            Some(&i) => groups[i].1.push(row.clone()),
            None => {
                positions.insert(id, groups.len());
                groups.push((id, vec![row.clone()]));
            }
        }
    }

    groups
}

/// Close price keyed by period for one instrument. Rows without a close are
/// left out.
pub fn close_series(rows: &[MarketRow], instrument_id: &str) -> BTreeMap<i64, f64> {
    rows.iter()
        .filter(|r| r.instrument_id == instrument_id)
        .filter_map(|r| r.close().map(|c| (r.period_index, c)))
        .collect()
}
