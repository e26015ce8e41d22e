//! Signal script language: the text form of a submitted prediction function.
//!
//! A script declares exactly one function taking the instrument's history
//! (and optionally one numeric config value) and returning two scores:
//!
//! ```text
//! def momentum(df, lookback = 5) {
//!     let c = df[-1].close;
//!     let score_5 = 0;
//!     if c > sma(df.close, lookback) { score_5 = 0.5; }
//!     return score_5, 0;
//! }
//! ```
//!
//! The language has no loops, no I/O and no global namespace, so evaluation
//! is bounded by the size of the script and the length of the history.

pub mod ast;
pub mod builtins;
pub mod check;
pub mod eval;
pub mod parser;

pub use eval::{RuntimeError, Value};
