//! Signal script AST.
//!
//! - `FunctionDef`: the single function a script declares
//! - `Stmt`: `let`, assignment, `if`/`else`, two-value `return`
//! - `Expr`: arithmetic, comparison, boolean logic, indexing, column access
//!   and builtin calls
//!
//! Every node that can fail at check or run time carries the byte offset it
//! started at, so diagnostics can point back into the submitted text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    /// Column key; only produced inside `[...]`.
    Str {
        value: String,
        position: usize,
    },
    Var {
        name: String,
        position: usize,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        position: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: usize,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        position: usize,
    },
    Field {
        target: Box<Expr>,
        name: String,
        position: usize,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
        position: usize,
    },
    Assign {
        name: String,
        value: Expr,
        position: usize,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    Return {
        first: Expr,
        second: Expr,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<f64>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub position: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_op_symbols() {
        assert_eq!(BinaryOp::Le.symbol(), "<=");
        assert_eq!(BinaryOp::And.symbol(), "and");
        assert_eq!(BinaryOp::Rem.symbol(), "%");
    }

    #[test]
    fn nested_expr_equality() {
        let a = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Number(1.0)),
            right: Box::new(Expr::Var {
                name: "x".into(),
                position: 4,
            }),
            position: 2,
        };
        assert_eq!(a.clone(), a);
        assert_ne!(a, Expr::Number(1.0));
    }
}
