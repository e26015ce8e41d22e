//! Static validation of a parsed signal script.
//!
//! Runs before the function is ever invoked:
//! - parameter list is `(frame)` or `(frame, config = default)`
//! - names are bound (parameter or `let`) before they are read or assigned
//! - builtins exist and are called with a valid number of arguments
//! - every control path ends in `return`

use crate::domain::error::ParseError;
use crate::domain::script::ast::{Expr, FunctionDef, Stmt};
use crate::domain::script::builtins;

struct Scopes {
    frames: Vec<Vec<String>>,
}

impl Scopes {
    fn new() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }

    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn bind(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(name.to_string());
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.iter().any(|n| n == name))
    }
}

pub fn check(def: &FunctionDef) -> Result<(), ParseError> {
    check_params(def)?;

    let mut scopes = Scopes::new();
    for param in &def.params {
        scopes.bind(&param.name);
    }
    check_block(&def.body, &mut scopes)?;

    if !always_returns(&def.body) {
        return Err(ParseError::new(
            format!("function '{}' does not return on every path", def.name),
            def.position,
        ));
    }
    Ok(())
}

fn check_params(def: &FunctionDef) -> Result<(), ParseError> {
    match def.params.as_slice() {
        [] => Err(ParseError::new(
            format!("function '{}' must take the data frame as its first parameter", def.name),
            def.position,
        )),
        [frame, rest @ ..] => {
            if frame.default.is_some() {
                return Err(ParseError::new(
                    format!("data frame parameter '{}' cannot have a default", frame.name),
                    frame.position,
                ));
            }
            match rest {
                [] => Ok(()),
                [config] if config.default.is_none() => Err(ParseError::new(
                    format!("config parameter '{}' needs a default value", config.name),
                    config.position,
                )),
                [config] if config.name == frame.name => Err(ParseError::new(
                    format!("duplicate parameter '{}'", config.name),
                    config.position,
                )),
                [_] => Ok(()),
                [_, extra, ..] => Err(ParseError::new(
                    "expected at most two parameters (frame, config)",
                    extra.position,
                )),
            }
        }
    }
}

fn check_block(stmts: &[Stmt], scopes: &mut Scopes) -> Result<(), ParseError> {
    scopes.push();
    let result = stmts.iter().try_for_each(|s| check_stmt(s, scopes));
    scopes.pop();
    result
}

fn check_stmt(stmt: &Stmt, scopes: &mut Scopes) -> Result<(), ParseError> {
    match stmt {
        Stmt::Let { name, value, .. } => {
            check_expr(value, scopes)?;
            scopes.bind(name);
            Ok(())
        }
        Stmt::Assign {
            name,
            value,
            position,
        } => {
            if !scopes.is_bound(name) {
                return Err(ParseError::new(
                    format!("assignment to undeclared name '{}' (declare it with 'let')", name),
                    *position,
                ));
            }
            check_expr(value, scopes)
        }
        Stmt::If {
            branches,
            otherwise,
        } => {
            for (cond, body) in branches {
                check_expr(cond, scopes)?;
                check_block(body, scopes)?;
            }
            if let Some(body) = otherwise {
                check_block(body, scopes)?;
            }
            Ok(())
        }
        Stmt::Return { first, second, .. } => {
            check_expr(first, scopes)?;
            check_expr(second, scopes)
        }
    }
}

fn check_expr(expr: &Expr, scopes: &Scopes) -> Result<(), ParseError> {
    match expr {
        Expr::Number(_) | Expr::Bool(_) | Expr::Str { .. } => Ok(()),
        Expr::Var { name, position } => {
            if scopes.is_bound(name) {
                Ok(())
            } else if builtins::lookup(name).is_some() {
                Err(ParseError::new(
                    format!("builtin '{}' must be called", name),
                    *position,
                ))
            } else {
                Err(ParseError::new(format!("undefined name '{}'", name), *position))
            }
        }
        Expr::Unary { expr, .. } => check_expr(expr, scopes),
        Expr::Binary { left, right, .. } => {
            check_expr(left, scopes)?;
            check_expr(right, scopes)
        }
        Expr::Index { target, index, .. } => {
            check_expr(target, scopes)?;
            check_expr(index, scopes)
        }
        Expr::Field { target, .. } => check_expr(target, scopes),
        Expr::Call {
            name,
            args,
            position,
        } => {
            let Some(builtin) = builtins::lookup(name) else {
                return Err(ParseError::new(format!("unknown function '{}'", name), *position));
            };
            if args.len() < builtin.min_args || args.len() > builtin.max_args {
                return Err(ParseError::new(
                    format!(
                        "'{}' expects {}, got {}",
                        name,
                        builtin.arity_description(),
                        args.len()
                    ),
                    *position,
                ));
            }
            args.iter().try_for_each(|a| check_expr(a, scopes))
        }
    }
}

fn always_returns(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Return { .. } => true,
        Stmt::If {
            branches,
            otherwise: Some(otherwise),
        } => branches.iter().all(|(_, body)| always_returns(body)) && always_returns(otherwise),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::script::parser::parse;

    fn check_src(src: &str) -> Result<(), ParseError> {
        check(&parse(src).unwrap())
    }

    #[test]
    fn accepts_template_shaped_function() {
        check_src(
            "def ema_signal(df, span = 15) {
                let current = df[-1];
                let score_5 = 0;
                let score_10 = 0;
                if current.close > ema(df.close, span) {
                    score_5 = 0.5;
                    let local = 1;
                    score_10 = local;
                }
                return clamp(score_5, -1, 1), score_10;
            }",
        )
        .unwrap();
    }

    #[test]
    fn rejects_missing_frame_param() {
        let err = check_src("def f() { return 0, 0; }").unwrap_err();
        assert!(err.message.contains("first parameter"));
    }

    #[test]
    fn rejects_config_without_default() {
        let err = check_src("def f(df, span) { return 0, 0; }").unwrap_err();
        assert!(err.message.contains("needs a default"));
    }

    #[test]
    fn rejects_frame_with_default() {
        let err = check_src("def f(df = 1) { return 0, 0; }").unwrap_err();
        assert!(err.message.contains("cannot have a default"));
    }

    #[test]
    fn rejects_too_many_params() {
        let err = check_src("def f(df, a = 1, b = 2) { return 0, 0; }").unwrap_err();
        assert!(err.message.contains("at most two parameters"));
    }

    #[test]
    fn rejects_duplicate_param() {
        let err = check_src("def f(df, df = 1) { return 0, 0; }").unwrap_err();
        assert!(err.message.contains("duplicate parameter"));
    }

    #[test]
    fn rejects_undefined_name() {
        let src = "def f(df) { return missing, 0; }";
        let err = check_src(src).unwrap_err();
        assert_eq!(err.message, "undefined name 'missing'");
        assert_eq!(&src[err.position..err.position + 7], "missing");
    }

    #[test]
    fn rejects_assignment_before_let() {
        let err = check_src("def f(df) { x = 1; return x, x; }").unwrap_err();
        assert!(err.message.contains("undeclared name 'x'"));
    }

    #[test]
    fn block_scoped_let_is_not_visible_after_block() {
        let err = check_src("def f(df) { if true { let x = 1; } return x, 0; }").unwrap_err();
        assert_eq!(err.message, "undefined name 'x'");
    }

    #[test]
    fn let_value_cannot_reference_itself() {
        let err = check_src("def f(df) { let x = x + 1; return x, 0; }").unwrap_err();
        assert_eq!(err.message, "undefined name 'x'");
    }

    #[test]
    fn rejects_unknown_function() {
        let err = check_src("def f(df) { return exec(1), 0; }").unwrap_err();
        assert_eq!(err.message, "unknown function 'exec'");
    }

    #[test]
    fn rejects_bad_arity() {
        let err = check_src("def f(df) { return clamp(1, 2), 0; }").unwrap_err();
        assert!(err.message.contains("'clamp' expects 3 arguments, got 2"), "{}", err.message);
    }

    #[test]
    fn rejects_uncalled_builtin() {
        let err = check_src("def f(df) { return abs, 0; }").unwrap_err();
        assert!(err.message.contains("must be called"));
    }

    #[test]
    fn rejects_missing_return_path() {
        let err = check_src("def f(df) { if true { return 1, 1; } }").unwrap_err();
        assert!(err.message.contains("does not return on every path"));
    }

    #[test]
    fn accepts_returns_in_all_branches() {
        check_src(
            "def f(df) {
                if len(df) > 2 { return 1, 1; } else if len(df) > 1 { return 0, 0; } else { return -1, -1; }
            }",
        )
        .unwrap();
    }
}
