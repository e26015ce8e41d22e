//! Signal script evaluation.
//!
//! Executes a checked [`FunctionDef`] against one instrument's history.
//!
//! # Evaluation semantics
//!
//! - The first parameter is bound to the frame, the second (if declared) to
//!   the caller's config value or its default
//! - `frame[i]` is a row, `frame.col` / `frame["col"]` a column series;
//!   negative indices count from the end
//! - `and`/`or` short-circuit and require booleans
//! - Arithmetic follows IEEE-754: `x / 0` is infinite, not an error
//! - `%` is floored modulo (result takes the sign of the divisor)
//! - `let` bindings are scoped to their block

use std::collections::HashMap;

use crate::domain::market::MarketRow;
use crate::domain::script::ast::{BinaryOp, Expr, FunctionDef, Stmt, UnaryOp};
use crate::domain::script::builtins;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("runtime error at position {position}: {message}")]
pub struct RuntimeError {
    pub message: String,
    pub position: usize,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Frame,
    Row(usize),
    Series(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Frame => "frame",
            Value::Row(_) => "row",
            Value::Series(_) => "series",
        }
    }
}

/// Read-only view of the instrument history a script runs against.
pub struct Frame<'a> {
    rows: &'a [MarketRow],
}

impl<'a> Frame<'a> {
    pub fn new(rows: &'a [MarketRow]) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> &MarketRow {
        &self.rows[index]
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|r| r.values.contains_key(name))
    }

    /// Column values in row order; rows missing the column read as NaN.
    pub fn column(&self, name: &str, position: usize) -> Result<Vec<f64>, RuntimeError> {
        if !self.has_column(name) {
            return Err(RuntimeError::new(format!("unknown column '{}'", name), position));
        }
        Ok(self
            .rows
            .iter()
            .map(|r| r.value(name).unwrap_or(f64::NAN))
            .collect())
    }

    /// Resolve a possibly negative script index against `len`.
    pub fn resolve_index(index: f64, len: usize, position: usize) -> Result<usize, RuntimeError> {
        if index.fract() != 0.0 || !index.is_finite() {
            return Err(RuntimeError::new(
                format!("index must be a whole number, got {}", index),
                position,
            ));
        }
        let resolved = if index < 0.0 {
            len as f64 + index
        } else {
            index
        };
        if resolved < 0.0 || resolved >= len as f64 {
            return Err(RuntimeError::new(
                format!("index {} out of range for length {}", index, len),
                position,
            ));
        }
        Ok(resolved as usize)
    }
}

struct Evaluator<'a> {
    frame: Frame<'a>,
    scopes: Vec<HashMap<String, Value>>,
}

/// Invoke `def` on `rows`, returning the two raw values of its `return`.
pub fn call(
    def: &FunctionDef,
    rows: &[MarketRow],
    config: Option<f64>,
) -> Result<(Value, Value), RuntimeError> {
    let mut globals = HashMap::new();
    let mut params = def.params.iter();
    if let Some(frame_param) = params.next() {
        globals.insert(frame_param.name.clone(), Value::Frame);
    }
    if let Some(config_param) = params.next() {
        let value = config.or(config_param.default).unwrap_or(0.0);
        globals.insert(config_param.name.clone(), Value::Number(value));
    }

    let mut evaluator = Evaluator {
        frame: Frame::new(rows),
        scopes: vec![globals],
    };

    match evaluator.exec_block(&def.body)? {
        Some(result) => Ok(result),
        None => Err(RuntimeError::new(
            format!("function '{}' finished without returning", def.name),
            def.position,
        )),
    }
}

impl<'a> Evaluator<'a> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Option<(Value, Value)>, RuntimeError> {
        self.scopes.push(HashMap::new());
        let mut result = Ok(None);
        for stmt in stmts {
            match self.exec_stmt(stmt) {
                Ok(None) => continue,
                other => {
                    result = other;
                    break;
                }
            }
        }
        self.scopes.pop();
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Option<(Value, Value)>, RuntimeError> {
        match stmt {
            Stmt::Let { name, value, .. } => {
                let v = self.eval(value)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), v);
                }
                Ok(None)
            }
            Stmt::Assign {
                name,
                value,
                position,
            } => {
                let v = self.eval(value)?;
                let slot = self
                    .scopes
                    .iter_mut()
                    .rev()
                    .find_map(|s| s.get_mut(name))
                    .ok_or_else(|| {
                        RuntimeError::new(format!("undefined name '{}'", name), *position)
                    })?;
                *slot = v;
                Ok(None)
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval_condition(cond)? {
                        return self.exec_block(body);
                    }
                }
                match otherwise {
                    Some(body) => self.exec_block(body),
                    None => Ok(None),
                }
            }
            Stmt::Return { first, second, .. } => {
                let a = self.eval(first)?;
                let b = self.eval(second)?;
                Ok(Some((a, b)))
            }
        }
    }

    fn eval_condition(&mut self, cond: &Expr) -> Result<bool, RuntimeError> {
        match self.eval(cond)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::new(
                format!("condition must be bool, got {}", other.type_name()),
                expr_position(cond),
            )),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str { value, position } => Err(RuntimeError::new(
                format!("string \"{}\" is only valid as a column key", value),
                *position,
            )),
            Expr::Var { name, position } => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| RuntimeError::new(format!("undefined name '{}'", name), *position)),
            Expr::Unary { op, expr, position } => {
                let v = self.eval(expr)?;
                match (op, v) {
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, other) => Err(RuntimeError::new(
                        format!("cannot negate {}", other.type_name()),
                        *position,
                    )),
                    (UnaryOp::Not, other) => Err(RuntimeError::new(
                        format!("'not' requires bool, got {}", other.type_name()),
                        *position,
                    )),
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => self.eval_binary(*op, left, right, *position),
            Expr::Index {
                target,
                index,
                position,
            } => self.eval_index(target, index, *position),
            Expr::Field {
                target,
                name,
                position,
            } => {
                let t = self.eval(target)?;
                self.column_access(t, name, *position)
            }
            Expr::Call {
                name,
                args,
                position,
            } => {
                let builtin = builtins::lookup(name).ok_or_else(|| {
                    RuntimeError::new(format!("unknown function '{}'", name), *position)
                })?;
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                (builtin.func)(&self.frame, &values, *position)
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        position: usize,
    ) -> Result<Value, RuntimeError> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.logical_operand(op, left, position)?;
            let short_circuit = match op {
                BinaryOp::And => !l,
                _ => l,
            };
            if short_circuit {
                return Ok(Value::Bool(l));
            }
            return Ok(Value::Bool(self.logical_operand(op, right, position)?));
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(match op {
                BinaryOp::Add => Value::Number(a + b),
                BinaryOp::Sub => Value::Number(a - b),
                BinaryOp::Mul => Value::Number(a * b),
                BinaryOp::Div => Value::Number(a / b),
                BinaryOp::Rem => Value::Number(a - b * (a / b).floor()),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::Le => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::Ge => Value::Bool(a >= b),
                BinaryOp::Eq => Value::Bool(a == b),
                BinaryOp::Ne => Value::Bool(a != b),
                BinaryOp::And | BinaryOp::Or => unreachable!(),
            }),
            (Value::Bool(a), Value::Bool(b)) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
                Ok(Value::Bool(if op == BinaryOp::Eq { a == b } else { a != b }))
            }
            (l, r) => Err(RuntimeError::new(
                format!(
                    "cannot apply '{}' to {} and {}",
                    op.symbol(),
                    l.type_name(),
                    r.type_name()
                ),
                position,
            )),
        }
    }

    fn logical_operand(
        &mut self,
        op: BinaryOp,
        expr: &Expr,
        position: usize,
    ) -> Result<bool, RuntimeError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::new(
                format!("'{}' requires bool operands, got {}", op.symbol(), other.type_name()),
                position,
            )),
        }
    }

    fn eval_index(
        &mut self,
        target: &Expr,
        index: &Expr,
        position: usize,
    ) -> Result<Value, RuntimeError> {
        let t = self.eval(target)?;
        if let Expr::Str { value, .. } = index {
            return self.column_access(t, value, position);
        }

        let i = match self.eval(index)? {
            Value::Number(n) => n,
            other => {
                return Err(RuntimeError::new(
                    format!("index must be a number, got {}", other.type_name()),
                    position,
                ));
            }
        };

        match t {
            Value::Frame => {
                let idx = Frame::resolve_index(i, self.frame.len(), position)?;
                Ok(Value::Row(idx))
            }
            Value::Series(column) => {
                let idx = Frame::resolve_index(i, self.frame.len(), position)?;
                let row = self.frame.row(idx);
                row.value(&column).map(Value::Number).ok_or_else(|| {
                    RuntimeError::new(
                        format!(
                            "column '{}' has no value at period {}",
                            column, row.period_index
                        ),
                        position,
                    )
                })
            }
            other => Err(RuntimeError::new(
                format!("cannot index {}", other.type_name()),
                position,
            )),
        }
    }

    fn column_access(
        &self,
        target: Value,
        name: &str,
        position: usize,
    ) -> Result<Value, RuntimeError> {
        match target {
            Value::Frame => {
                if self.frame.has_column(name) {
                    Ok(Value::Series(name.to_string()))
                } else {
                    Err(RuntimeError::new(format!("unknown column '{}'", name), position))
                }
            }
            Value::Row(idx) => {
                let row = self.frame.row(idx);
                row.value(name).map(Value::Number).ok_or_else(|| {
                    RuntimeError::new(
                        format!("row at period {} has no column '{}'", row.period_index, name),
                        position,
                    )
                })
            }
            other => Err(RuntimeError::new(
                format!("{} has no column '{}'", other.type_name(), name),
                position,
            )),
        }
    }
}

fn expr_position(expr: &Expr) -> usize {
    match expr {
        Expr::Var { position, .. }
        | Expr::Unary { position, .. }
        | Expr::Binary { position, .. }
        | Expr::Index { position, .. }
        | Expr::Field { position, .. }
        | Expr::Call { position, .. }
        | Expr::Str { position, .. } => *position,
        Expr::Number(_) | Expr::Bool(_) => 0,
    }
}
