//! Starter function template and the dataset column glossary shown to users
//! writing a new strategy.

use std::fmt::Write as _;

pub const STARTER_TEMPLATE: &str = "\
# Predict target_5 and target_10 from the latest row and EMA.
# Both scores should lie between -1 and 1.
def exponential_moving_average_prediction(df, span = 15) {
    # latest row of data
    let current = df[-1];

    let score_5 = 0;
    let score_10 = 0;

    # code here
    if current.close > ema(df.close, span) {
        score_5 = 0.5;
        score_10 = 0.25;
    }
    # end of code

    return score_5, score_10;
}
";

pub struct ColumnGroup {
    pub title: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

pub const COLUMN_GLOSSARY: &[ColumnGroup] = &[
    ColumnGroup {
        title: "Price and price relationships",
        columns: &[
            ("High_n, Low_n, Open_n, Close_n", "high, low, open and close for period n"),
            ("High_n-Low_n", "range between high and low in period n"),
            ("Open_n-Close_n", "open minus close in period n"),
        ],
    },
    ColumnGroup {
        title: "Simple moving averages",
        columns: &[
            ("SMA_10, SMA_20", "10- and 20-period simple moving averages"),
            ("SMA_20-SMA_10", "difference between the two averages"),
        ],
    },
    ColumnGroup {
        title: "Change lengths",
        columns: &[
            (
                "Open_n_changelen, High_n_changelen, Low_n_changelen, Close_n_changelen",
                "periods over which the price has kept changing in one direction",
            ),
            ("SMA_20-SMA_10_changelen", "change length of the SMA difference"),
            (
                "Close_n_slope_3_changelen, Close_n_slope_5_changelen, Close_n_slope_10_changelen",
                "change length of the close slopes",
            ),
        ],
    },
    ColumnGroup {
        title: "Price slopes",
        columns: &[(
            "Close_n_slope_3, Close_n_slope_5, Close_n_slope_10",
            "rate of change of close over 3, 5 and 10 periods",
        )],
    },
    ColumnGroup {
        title: "Absolute values",
        columns: &[
            ("Open_n_val, High_n_val, Low_n_val, Close_n_val", "absolute price values"),
            ("SMA_10_val, SMA_20_val", "absolute SMA values"),
            ("CMO_14_val, RSI_14_val", "absolute momentum and strength values"),
        ],
    },
    ColumnGroup {
        title: "Technical indicators",
        columns: &[
            ("VOL_SMA_20", "20-period SMA of volume"),
            ("RSI_14", "relative strength index over 14 periods"),
            ("CMO_14", "Chande momentum oscillator over 14 periods"),
            ("BBL_5_2.0, BBM_5_2.0, BBU_5_2.0", "Bollinger bands (lower, middle, upper), 5 periods, 2.0 sd"),
            ("BBB_5_2.0, BBP_5_2.0", "Bollinger band width and percentage"),
            ("MACD_12_26_9", "MACD line"),
            ("MACDh_12_26_9, MACDs_12_26_9", "MACD histogram and signal line"),
            ("VWAP_D", "daily volume weighted average price"),
            ("MOM_30", "momentum over 30 periods"),
        ],
    },
    ColumnGroup {
        title: "Targets",
        columns: &[
            ("target_5, target_10", "5- and 10-period prediction targets"),
            ("target_5_val, target_10_val", "numeric target values"),
        ],
    },
    ColumnGroup {
        title: "Identifiers",
        columns: &[
            ("row_num", "period index"),
            ("era", "period grouping"),
            ("id", "instrument identifier"),
        ],
    },
];

/// Template plus glossary as plain text. Columns whose names are not plain
/// identifiers are read with `row["name"]`.
pub fn render() -> String {
    let mut out = String::from(STARTER_TEMPLATE);
    out.push_str("\n# Dataset columns\n");
    out.push_str("# (use row[\"High_n-Low_n\"] for names that are not identifiers)\n");
    for group in COLUMN_GLOSSARY {
        let _ = writeln!(out, "#\n# {}", group.title);
        for (names, description) in group.columns {
            let _ = writeln!(out, "#   {}: {}", names, description);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loader::load_strategy;
    use crate::domain::market::MarketRow;

    #[test]
    fn template_loads_and_runs() {
        let f = load_strategy(STARTER_TEMPLATE).unwrap();
        assert_eq!(f.name(), "exponential_moving_average_prediction");
        assert_eq!(f.default_config(), Some(15.0));

        let rows: Vec<MarketRow> = (1..=20)
            .map(|p| MarketRow::new("BTC", p).with_value("close", p as f64))
            .collect();
        let (s5, s10) = f.invoke(&rows, None).unwrap();
        assert_eq!(s5, crate::domain::script::Value::Number(0.5));
        assert_eq!(s10, crate::domain::script::Value::Number(0.25));
    }

    #[test]
    fn rendered_text_is_still_loadable() {
        // glossary lines are comments
        let text = render();
        assert!(text.contains("RSI_14"));
        assert!(load_strategy(&text).is_ok());
    }
}
