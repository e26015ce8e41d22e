//! Action and reward events as reported by a backtest.
//!
//! Both arrive as positional JSON arrays. Decoding is lenient at the batch
//! level: a malformed entry decodes to `None` and the caller decides whether
//! to skip it.

use serde_json::Value as Json;

/// `[action_code, trade_id, param_a, param_b]`
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub action_code: i64,
    pub trade_id: String,
    pub param_a: Json,
    pub param_b: Json,
}

/// `[trade_id, reward_value, round_number]`
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEvent {
    pub trade_id: String,
    pub reward_value: f64,
    pub round_number: i64,
}

/// Integers may arrive as `1` or `1.0`.
fn as_integer(value: &Json) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
}

/// Trade ids are strings on the wire, but numeric ids are accepted.
fn as_trade_id(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ActionEvent {
    pub fn new(action_code: i64, trade_id: impl Into<String>) -> Self {
        ActionEvent {
            action_code,
            trade_id: trade_id.into(),
            param_a: Json::Null,
            param_b: Json::Null,
        }
    }

    pub fn from_raw(raw: &Json) -> Option<Self> {
        let fields = raw.as_array()?;
        if fields.len() < 4 {
            return None;
        }
        Some(ActionEvent {
            action_code: as_integer(&fields[0])?,
            trade_id: as_trade_id(&fields[1])?,
            param_a: fields[2].clone(),
            param_b: fields[3].clone(),
        })
    }

    pub fn to_raw(&self) -> Json {
        Json::Array(vec![
            Json::from(self.action_code),
            Json::from(self.trade_id.clone()),
            self.param_a.clone(),
            self.param_b.clone(),
        ])
    }
}

impl RewardEvent {
    pub fn new(trade_id: impl Into<String>, reward_value: f64, round_number: i64) -> Self {
        RewardEvent {
            trade_id: trade_id.into(),
            reward_value,
            round_number,
        }
    }

    pub fn from_raw(raw: &Json) -> Option<Self> {
        let fields = raw.as_array()?;
        if fields.len() < 3 {
            return None;
        }
        let reward_value = fields[1].as_f64()?;
        if !reward_value.is_finite() {
            return None;
        }
        Some(RewardEvent {
            trade_id: as_trade_id(&fields[0])?,
            reward_value,
            round_number: as_integer(&fields[2])?,
        })
    }

    pub fn to_raw(&self) -> Json {
        Json::Array(vec![
            Json::from(self.trade_id.clone()),
            Json::from(self.reward_value),
            Json::from(self.round_number),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_action() {
        let a = ActionEvent::from_raw(&json!([1, "t1", 0.5, {"size": 2}])).unwrap();
        assert_eq!(a.action_code, 1);
        assert_eq!(a.trade_id, "t1");
        assert_eq!(a.param_a, json!(0.5));
        assert_eq!(a.param_b, json!({"size": 2}));
    }

    #[test]
    fn action_code_accepts_integral_float() {
        let a = ActionEvent::from_raw(&json!([-1.0, "t1", null, null])).unwrap();
        assert_eq!(a.action_code, -1);
        assert!(ActionEvent::from_raw(&json!([0.5, "t1", null, null])).is_none());
    }

    #[test]
    fn numeric_trade_id_is_stringified() {
        let r = RewardEvent::from_raw(&json!([42, 0.1, 3])).unwrap();
        assert_eq!(r.trade_id, "42");
    }

    #[test]
    fn malformed_actions_are_none() {
        assert!(ActionEvent::from_raw(&json!([1, "t1", 0])).is_none());
        assert!(ActionEvent::from_raw(&json!(["buy", "t1", 0, 0])).is_none());
        assert!(ActionEvent::from_raw(&json!([1, null, 0, 0])).is_none());
        assert!(ActionEvent::from_raw(&json!({"action": 1})).is_none());
    }

    #[test]
    fn malformed_rewards_are_none() {
        assert!(RewardEvent::from_raw(&json!(["t1", 0.1])).is_none());
        assert!(RewardEvent::from_raw(&json!(["t1", "high", 3])).is_none());
        assert!(RewardEvent::from_raw(&json!(["t1", 0.1, "r3"])).is_none());
        assert!(RewardEvent::from_raw(&json!(null)).is_none());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let r = RewardEvent::from_raw(&json!(["t1", 0.05, 3, "extra"])).unwrap();
        assert_eq!(r, RewardEvent::new("t1", 0.05, 3));
    }

    #[test]
    fn raw_form_decodes_back() {
        let r = RewardEvent::new("BTC-4", -0.02, 4);
        assert_eq!(RewardEvent::from_raw(&r.to_raw()), Some(r));
    }
}
