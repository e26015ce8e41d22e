//! Builtin functions available to signal scripts.
//!
//! Indicator builtins (`sma`, `ema`, `rsi`, `stddev`) return the indicator's
//! value at the last row of the frame, NaN while still warming up. Window
//! builtins (`mean`, `sum`, `highest`, `lowest`) take an optional look-back
//! length; without it they cover the whole series.

use crate::domain::indicator;
use crate::domain::script::eval::{Frame, RuntimeError, Value};

type BuiltinFn = fn(&Frame<'_>, &[Value], usize) -> Result<Value, RuntimeError>;

pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub func: BuiltinFn,
}

impl Builtin {
    pub fn arity_description(&self) -> String {
        let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };
        if self.min_args == self.max_args {
            format!("{} {}", self.min_args, plural(self.min_args))
        } else if self.max_args == usize::MAX {
            format!("at least {} {}", self.min_args, plural(self.min_args))
        } else {
            format!("{} to {} arguments", self.min_args, self.max_args)
        }
    }
}

const fn builtin(name: &'static str, min_args: usize, max_args: usize, func: BuiltinFn) -> Builtin {
    Builtin {
        name,
        min_args,
        max_args,
        func,
    }
}

static BUILTINS: &[Builtin] = &[
    builtin("abs", 1, 1, abs),
    builtin("sqrt", 1, 1, sqrt),
    builtin("tanh", 1, 1, tanh),
    builtin("sign", 1, 1, sign),
    builtin("isnan", 1, 1, isnan),
    builtin("min", 2, usize::MAX, min),
    builtin("max", 2, usize::MAX, max),
    builtin("clamp", 3, 3, clamp),
    builtin("len", 1, 1, len),
    builtin("last", 1, 1, last),
    builtin("sma", 2, 2, sma),
    builtin("ema", 2, 2, ema),
    builtin("rsi", 2, 2, rsi),
    builtin("stddev", 2, 2, stddev),
    builtin("mean", 1, 2, mean),
    builtin("sum", 1, 2, sum),
    builtin("highest", 1, 2, highest),
    builtin("lowest", 1, 2, lowest),
    builtin("change", 1, 2, change),
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

// ── Argument helpers ────────────────────────────────────────────────────

fn number(args: &[Value], i: usize, func: &str, position: usize) -> Result<f64, RuntimeError> {
    match &args[i] {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeError::new(
            format!(
                "argument {} of '{}' must be a number, got {}",
                i + 1,
                func,
                other.type_name()
            ),
            position,
        )),
    }
}

fn series(
    frame: &Frame<'_>,
    args: &[Value],
    i: usize,
    func: &str,
    position: usize,
) -> Result<Vec<f64>, RuntimeError> {
    match &args[i] {
        Value::Series(column) => frame.column(column, position),
        other => Err(RuntimeError::new(
            format!(
                "argument {} of '{}' must be a series, got {}",
                i + 1,
                func,
                other.type_name()
            ),
            position,
        )),
    }
}

fn period(args: &[Value], i: usize, func: &str, position: usize) -> Result<usize, RuntimeError> {
    let n = number(args, i, func, position)?;
    if n < 1.0 || n.fract() != 0.0 || !n.is_finite() {
        return Err(RuntimeError::new(
            format!("'{}' needs a positive whole period, got {}", func, n),
            position,
        ));
    }
    Ok(n as usize)
}

/// Trailing window of `values`, `args[1]` long when given.
fn window(
    frame: &Frame<'_>,
    args: &[Value],
    func: &str,
    position: usize,
) -> Result<Vec<f64>, RuntimeError> {
    let values = series(frame, args, 0, func, position)?;
    if args.len() < 2 {
        return Ok(values);
    }
    let n = period(args, 1, func, position)?;
    let start = values.len().saturating_sub(n);
    Ok(values[start..].to_vec())
}

fn unary(args: &[Value], func: &str, position: usize, f: fn(f64) -> f64) -> Result<Value, RuntimeError> {
    Ok(Value::Number(f(number(args, 0, func, position)?)))
}

fn indicator_last(
    frame: &Frame<'_>,
    args: &[Value],
    func: &str,
    position: usize,
    f: fn(&[f64], usize) -> Vec<Option<f64>>,
) -> Result<Value, RuntimeError> {
    let values = series(frame, args, 0, func, position)?;
    let n = period(args, 1, func, position)?;
    let last = f(&values, n).last().copied().flatten();
    Ok(Value::Number(last.unwrap_or(f64::NAN)))
}

// ── Scalar math ─────────────────────────────────────────────────────────

fn abs(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    unary(args, "abs", position, f64::abs)
}

fn sqrt(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    unary(args, "sqrt", position, f64::sqrt)
}

fn tanh(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    unary(args, "tanh", position, f64::tanh)
}

fn sign(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    unary(args, "sign", position, |x| if x == 0.0 { 0.0 } else { x.signum() })
}

fn isnan(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(number(args, 0, "isnan", position)?.is_nan()))
}

fn min(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let mut acc = f64::INFINITY;
    for i in 0..args.len() {
        acc = acc.min(number(args, i, "min", position)?);
    }
    Ok(Value::Number(acc))
}

fn max(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let mut acc = f64::NEG_INFINITY;
    for i in 0..args.len() {
        acc = acc.max(number(args, i, "max", position)?);
    }
    Ok(Value::Number(acc))
}

fn clamp(_: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let x = number(args, 0, "clamp", position)?;
    let lo = number(args, 1, "clamp", position)?;
    let hi = number(args, 2, "clamp", position)?;
    if lo.is_nan() || hi.is_nan() || lo > hi {
        return Err(RuntimeError::new(
            format!("'clamp' bounds are invalid: [{}, {}]", lo, hi),
            position,
        ));
    }
    Ok(Value::Number(x.clamp(lo, hi)))
}

// ── Frame and series ────────────────────────────────────────────────────

fn len(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Frame | Value::Series(_) => Ok(Value::Number(frame.len() as f64)),
        other => Err(RuntimeError::new(
            format!("'len' needs a frame or series, got {}", other.type_name()),
            position,
        )),
    }
}

fn last(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    if frame.is_empty() {
        return Err(RuntimeError::new("'last' called on an empty frame", position));
    }
    match &args[0] {
        Value::Frame => Ok(Value::Row(frame.len() - 1)),
        Value::Series(_) => {
            let values = series(frame, args, 0, "last", position)?;
            Ok(Value::Number(values[values.len() - 1]))
        }
        other => Err(RuntimeError::new(
            format!("'last' needs a frame or series, got {}", other.type_name()),
            position,
        )),
    }
}

fn sma(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    indicator_last(frame, args, "sma", position, indicator::sma)
}

fn ema(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    indicator_last(frame, args, "ema", position, indicator::ema)
}

fn rsi(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    indicator_last(frame, args, "rsi", position, indicator::rsi)
}

fn stddev(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    indicator_last(frame, args, "stddev", position, indicator::stddev)
}

fn mean(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let values = window(frame, args, "mean", position)?;
    if values.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
}

fn sum(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let values = window(frame, args, "sum", position)?;
    Ok(Value::Number(values.iter().sum()))
}

fn highest(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let values = window(frame, args, "highest", position)?;
    Ok(Value::Number(
        values.into_iter().reduce(f64::max).unwrap_or(f64::NAN),
    ))
}

fn lowest(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let values = window(frame, args, "lowest", position)?;
    Ok(Value::Number(
        values.into_iter().reduce(f64::min).unwrap_or(f64::NAN),
    ))
}

/// Last value minus the value `n` rows earlier (default 1).
fn change(frame: &Frame<'_>, args: &[Value], position: usize) -> Result<Value, RuntimeError> {
    let values = series(frame, args, 0, "change", position)?;
    let n = if args.len() > 1 {
        period(args, 1, "change", position)?
    } else {
        1
    };
    if n >= values.len() {
        return Ok(Value::Number(f64::NAN));
    }
    let end = values.len() - 1;
    Ok(Value::Number(values[end] - values[end - n]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketRow;
    use approx::assert_relative_eq;

    fn rows(closes: &[f64]) -> Vec<MarketRow> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| MarketRow::new("ETH", i as i64).with_value("close", c))
            .collect()
    }

    fn call(name: &str, rows: &[MarketRow], args: &[Value]) -> Result<Value, RuntimeError> {
        let b = lookup(name).unwrap();
        (b.func)(&Frame::new(rows), args, 0)
    }

    fn num(v: Value) -> f64 {
        match v {
            Value::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    fn close() -> Value {
        Value::Series("close".into())
    }

    #[test]
    fn sma_and_mean_skip_past_gap() {
        let mut r = rows(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        r[1] = MarketRow::new("ETH", 1);
        assert_relative_eq!(num(call("sma", &r, &[close(), Value::Number(2.0)]).unwrap()), 4.5);
        assert_relative_eq!(num(call("mean", &r, &[close(), Value::Number(2.0)]).unwrap()), 4.5);
        assert!(num(call("sma", &r, &[close(), Value::Number(4.0)]).unwrap()).is_nan());
    }

    #[test]
    fn lookup_known_and_unknown() {
        assert!(lookup("ema").is_some());
        assert!(lookup("eval").is_none());
        assert_eq!(lookup("clamp").map(|b| b.name), Some("clamp"));
    }

    #[test]
    fn arity_descriptions() {
        assert_eq!(lookup("abs").unwrap().arity_description(), "1 argument");
        assert_eq!(lookup("clamp").unwrap().arity_description(), "3 arguments");
        assert_eq!(lookup("min").unwrap().arity_description(), "at least 2 arguments");
        assert_eq!(lookup("mean").unwrap().arity_description(), "1 to 2 arguments");
    }

    #[test]
    fn scalar_math() {
        let r = rows(&[1.0]);
        assert_eq!(num(call("abs", &r, &[Value::Number(-2.0)]).unwrap()), 2.0);
        assert_eq!(num(call("sign", &r, &[Value::Number(0.0)]).unwrap()), 0.0);
        assert_eq!(num(call("sign", &r, &[Value::Number(-3.0)]).unwrap()), -1.0);
        assert_eq!(
            num(call("min", &r, &[Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)]).unwrap()),
            1.0
        );
        assert_eq!(
            num(call("clamp", &r, &[Value::Number(4.0), Value::Number(-1.0), Value::Number(1.0)]).unwrap()),
            1.0
        );
        assert_eq!(
            call("isnan", &r, &[Value::Number(f64::NAN)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn clamp_rejects_inverted_bounds() {
        let err = call(
            "clamp",
            &rows(&[1.0]),
            &[Value::Number(0.0), Value::Number(1.0), Value::Number(-1.0)],
        )
        .unwrap_err();
        assert!(err.message.contains("bounds are invalid"));
    }

    #[test]
    fn type_errors_name_the_argument() {
        let err = call("abs", &rows(&[1.0]), &[Value::Frame]).unwrap_err();
        assert_eq!(err.message, "argument 1 of 'abs' must be a number, got frame");
        let err = call("sma", &rows(&[1.0]), &[Value::Number(1.0), Value::Number(2.0)]).unwrap_err();
        assert_eq!(err.message, "argument 1 of 'sma' must be a series, got number");
    }

    #[test]
    fn indicators_return_latest_value() {
        let r = rows(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_relative_eq!(num(call("sma", &r, &[close(), Value::Number(3.0)]).unwrap()), 4.0);
        assert!(num(call("sma", &r, &[close(), Value::Number(6.0)]).unwrap()).is_nan());
        assert_relative_eq!(num(call("rsi", &r, &[close(), Value::Number(3.0)]).unwrap()), 100.0);
    }

    #[test]
    fn period_must_be_positive_whole() {
        let r = rows(&[1.0, 2.0]);
        let err = call("ema", &r, &[close(), Value::Number(0.0)]).unwrap_err();
        assert!(err.message.contains("positive whole period"));
        let err = call("mean", &r, &[close(), Value::Number(1.5)]).unwrap_err();
        assert!(err.message.contains("positive whole period"));
    }

    #[test]
    fn windows() {
        let r = rows(&[4.0, 1.0, 3.0, 2.0]);
        assert_relative_eq!(num(call("mean", &r, &[close()]).unwrap()), 2.5);
        assert_relative_eq!(num(call("mean", &r, &[close(), Value::Number(2.0)]).unwrap()), 2.5);
        assert_relative_eq!(num(call("sum", &r, &[close(), Value::Number(3.0)]).unwrap()), 6.0);
        assert_relative_eq!(num(call("highest", &r, &[close(), Value::Number(3.0)]).unwrap()), 3.0);
        assert_relative_eq!(num(call("lowest", &r, &[close()]).unwrap()), 1.0);
        // window longer than the series covers all of it
        assert_relative_eq!(num(call("sum", &r, &[close(), Value::Number(10.0)]).unwrap()), 10.0);
    }

    #[test]
    fn change_over_periods() {
        let r = rows(&[10.0, 12.0, 15.0]);
        assert_relative_eq!(num(call("change", &r, &[close()]).unwrap()), 3.0);
        assert_relative_eq!(num(call("change", &r, &[close(), Value::Number(2.0)]).unwrap()), 5.0);
        assert!(num(call("change", &r, &[close(), Value::Number(3.0)]).unwrap()).is_nan());
    }

    #[test]
    fn len_and_last() {
        let r = rows(&[10.0, 12.0]);
        assert_eq!(num(call("len", &r, &[Value::Frame]).unwrap()), 2.0);
        assert_eq!(call("last", &r, &[Value::Frame]).unwrap(), Value::Row(1));
        assert_eq!(num(call("last", &r, &[close()]).unwrap()), 12.0);
        let err = call("last", &[], &[Value::Frame]).unwrap_err();
        assert!(err.message.contains("empty frame"));
    }
}
