//! Technical indicators over plain value series.
//!
//! Every function returns one entry per input value; entries inside the
//! warm-up window are `None`.

/// Simple moving average. Warm-up: first (n-1) values. A window holding a
/// non-finite value (a gap) is `None`; later windows recover once it drops out.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut gaps = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_finite() {
            sum += v;
        } else {
            gaps += 1;
        }
        if i >= period {
            let old = values[i - period];
            if old.is_finite() {
                sum -= old;
            } else {
                gaps -= 1;
            }
        }
        out.push(if i + 1 >= period && gaps == 0 {
            Some(sum / period as f64)
        } else {
            None
        });
    }
    out
}

/// Exponential moving average, k = 2/(n+1), seeded with the first SMA.
/// Warm-up: first (n-1) values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut ema = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if i + 1 < period {
            sum += v;
            out.push(None);
        } else if i + 1 == period {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = v * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

/// RSI with Wilder's smoothing. If the average loss is zero the RSI is 100.
/// Warm-up: first n values (n price changes are needed).
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < 2 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    out.push(None);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = i;

        if n < period {
            avg_gain += gain;
            avg_loss += loss;
            out.push(None);
            continue;
        }

        if n == period {
            avg_gain = (avg_gain + gain) / period as f64;
            avg_loss = (avg_loss + loss) / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        let value = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        out.push(Some(value));
    }
    out
}

/// Population standard deviation over n values. Warm-up: first (n-1) values.
pub fn stddev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
            Some(variance.sqrt())
        })
        .collect()
}
