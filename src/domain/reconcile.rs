//! Trade reconciliation: actions ⋈ rewards ⋈ close prices.
//!
//! Unlike the prediction runner, nothing here fails. Malformed events,
//! unmatched halves and periods without a price each drop a single record.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as Json;

use crate::domain::events::{ActionEvent, RewardEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    /// `+1` is a buy; every other code is reported as a sell.
    pub fn from_action(action: i64) -> Self {
        if action == 1 {
            TradeType::Buy
        } else {
            TradeType::Sell
        }
    }
}

/// One matched trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub period: i64,
    pub action: i64,
    pub price: f64,
    #[serde(rename = "return")]
    pub return_value: f64,
    pub return_pct: f64,
    pub trade_type: TradeType,
    pub trade_id: String,
}

/// Keyed by trade id, later entries overwriting earlier ones.
fn index_last_wins<T>(
    events: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> &str,
    stream: &'static str,
) -> BTreeMap<String, T> {
    let mut map = BTreeMap::new();
    for event in events {
        let id = key(&event).to_string();
        if map.contains_key(&id) {
            tracing::warn!(trade_id = %id, stream, "duplicate trade id, keeping the later entry");
        }
        map.insert(id, event);
    }
    map
}

/// Reconcile raw positional event arrays against `prices` (close by period).
pub fn reconcile(actions: &[Json], rewards: &[Json], prices: &BTreeMap<i64, f64>) -> Vec<TradeRecord> {
    let decoded_actions: Vec<ActionEvent> = actions.iter().filter_map(ActionEvent::from_raw).collect();
    let decoded_rewards: Vec<RewardEvent> = rewards.iter().filter_map(RewardEvent::from_raw).collect();

    let skipped_actions = actions.len() - decoded_actions.len();
    let skipped_rewards = rewards.len() - decoded_rewards.len();
    if skipped_actions + skipped_rewards > 0 {
        tracing::debug!(skipped_actions, skipped_rewards, "malformed events skipped");
    }

    reconcile_events(decoded_actions, decoded_rewards, prices)
}

/// Reconcile already-decoded events. Output is sorted by `(period, trade_id)`.
pub fn reconcile_events(
    actions: impl IntoIterator<Item = ActionEvent>,
    rewards: impl IntoIterator<Item = RewardEvent>,
    prices: &BTreeMap<i64, f64>,
) -> Vec<TradeRecord> {
    let acts_map = index_last_wins(actions, |a| a.trade_id.as_str(), "actions");
    let rew_map = index_last_wins(rewards, |r| r.trade_id.as_str(), "rewards");

    let mut records = Vec::new();
    let mut unpriced = 0usize;

    for (trade_id, action) in &acts_map {
        let Some(reward) = rew_map.get(trade_id) else {
            continue;
        };
        let Some(&price) = prices.get(&reward.round_number) else {
            unpriced += 1;
            continue;
        };
        records.push(TradeRecord {
            period: reward.round_number,
            action: action.action_code,
            price,
            return_value: reward.reward_value,
            return_pct: reward.reward_value * 100.0,
            trade_type: TradeType::from_action(action.action_code),
            trade_id: trade_id.clone(),
        });
    }

    if unpriced > 0 {
        tracing::debug!(unpriced, "matched trades without a close price skipped");
    }

    records.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.trade_id.cmp(&b.trade_id)));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn prices(pairs: &[(i64, f64)]) -> BTreeMap<i64, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn matches_only_shared_trade_ids() {
        let actions = vec![json!([1, "t1", 0, 0]), json!([-1, "t2", 0, 0])];
        let rewards = vec![json!(["t1", 0.05, 3]), json!(["t3", 0.02, 4])];
        let records = reconcile(&actions, &rewards, &prices(&[(3, 100.0), (4, 101.0)]));

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.trade_id, "t1");
        assert_eq!(r.period, 3);
        assert_eq!(r.action, 1);
        assert_eq!(r.price, 100.0);
        assert_relative_eq!(r.return_value, 0.05);
        assert_relative_eq!(r.return_pct, 5.0);
        assert_eq!(r.trade_type, TradeType::Buy);
    }

    #[test]
    fn trade_without_price_is_dropped() {
        let actions = vec![json!([1, "t1", 0, 0]), json!([-1, "t2", 0, 0])];
        let rewards = vec![json!(["t1", 0.05, 3]), json!(["t2", -0.01, 9])];
        let records = reconcile(&actions, &rewards, &prices(&[(3, 100.0)]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].trade_id, "t1");
    }

    #[test]
    fn malformed_events_are_skipped_individually() {
        let actions = vec![json!([1, "t1"]), json!([-1, "t2", 0, 0]), json!("junk")];
        let rewards = vec![json!(["t1", 0.05, 3]), json!(["t2", "x", 3]), json!(["t2", 0.01, 3])];
        let records = reconcile(&actions, &rewards, &prices(&[(3, 50.0)]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].trade_id, "t2");
        assert_eq!(records[0].trade_type, TradeType::Sell);
    }

    #[test]
    fn duplicate_ids_keep_the_later_entry() {
        let actions = vec![json!([1, "t1", 0, 0]), json!([-1, "t1", 0, 0])];
        let rewards = vec![json!(["t1", 0.05, 3]), json!(["t1", 0.07, 4])];
        let records = reconcile(&actions, &rewards, &prices(&[(3, 100.0), (4, 110.0)]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, -1);
        assert_eq!(records[0].period, 4);
        assert_eq!(records[0].price, 110.0);
    }

    #[test]
    fn non_unit_action_codes_count_as_sell() {
        let records = reconcile_events(
            vec![ActionEvent::new(0, "a"), ActionEvent::new(2, "b")],
            vec![RewardEvent::new("a", 0.0, 1), RewardEvent::new("b", 0.0, 1)],
            &prices(&[(1, 1.0)]),
        );
        assert!(records.iter().all(|r| r.trade_type == TradeType::Sell));
    }

    #[test]
    fn output_is_sorted_by_period_then_id() {
        let records = reconcile_events(
            vec![
                ActionEvent::new(1, "z"),
                ActionEvent::new(1, "a"),
                ActionEvent::new(1, "m"),
            ],
            vec![
                RewardEvent::new("z", 0.0, 1),
                RewardEvent::new("a", 0.0, 2),
                RewardEvent::new("m", 0.0, 1),
            ],
            &prices(&[(1, 1.0), (2, 2.0)]),
        );
        let order: Vec<(i64, &str)> = records.iter().map(|r| (r.period, r.trade_id.as_str())).collect();
        assert_eq!(order, vec![(1, "m"), (1, "z"), (2, "a")]);
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        assert!(reconcile(&[], &[], &BTreeMap::new()).is_empty());
    }

    #[test]
    fn serializes_return_field_and_trade_type() {
        let records = reconcile_events(
            vec![ActionEvent::new(1, "t1")],
            vec![RewardEvent::new("t1", 0.05, 3)],
            &prices(&[(3, 100.0)]),
        );
        let v = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(v["return"], json!(0.05));
        assert_eq!(v["trade_type"], json!("BUY"));
        assert!(v.get("return_value").is_none());
    }

    proptest! {
        #[test]
        fn order_of_distinct_key_logs_does_not_matter(
            n in 1usize..20,
            seed_a in any::<u64>(),
            seed_r in any::<u64>(),
        ) {
            let actions: Vec<Json> = (0..n)
                .map(|i| json!([if i % 2 == 0 { 1 } else { -1 }, format!("t{i}"), 0, 0]))
                .collect();
            let rewards: Vec<Json> = (0..n)
                .filter(|i| i % 3 != 0)
                .map(|i| json!([format!("t{i}"), i as f64 / 100.0, (i % 5) as i64]))
                .collect();
            let px = prices(&[(0, 10.0), (1, 11.0), (2, 12.0), (4, 14.0)]);

            let rotate = |v: &[Json], seed: u64| {
                let mut out = v.to_vec();
                if !out.is_empty() {
                    let k = (seed as usize) % out.len();
                    out.rotate_left(k);
                    if seed % 2 == 1 {
                        out.reverse();
                    }
                }
                out
            };

            let baseline = reconcile(&actions, &rewards, &px);
            let shuffled = reconcile(&rotate(&actions, seed_a), &rotate(&rewards, seed_r), &px);
            prop_assert_eq!(baseline, shuffled);
        }
    }
}
