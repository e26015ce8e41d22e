//! Signal script parser.
//!
//! Recursive descent over the raw text, no separate tokenizer. Errors carry
//! the byte offset of the offending input and say what was expected and what
//! was found.

use crate::domain::error::ParseError;
use crate::domain::script::ast::{BinaryOp, Expr, FunctionDef, Param, Stmt, UnaryOp};

/// Bound on expression and block nesting. Left-deep operator chains count
/// one level per operator, so the tree handed to `check` and `eval` stays
/// shallow enough for their recursion.
const MAX_DEPTH: usize = 100;

const KEYWORDS: &[&str] = &[
    "def", "let", "if", "else", "return", "and", "or", "not", "true", "false",
];

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Skips whitespace and `#` comments.
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.pos)
    }

    /// One level deeper; callers restore `depth` when they unwind normally.
    fn descend(&mut self, what: &str) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("{} nested too deeply", what)));
        }
        Ok(())
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(_) => format!("'{}'", self.peek_word()),
            None => "end of input".to_string(),
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}', found {}", expected, self.found()))),
        }
    }

    fn consume_char(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", keyword, self.found())))
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek().map(|c| c.to_string()).unwrap_or_default()
        } else {
            word
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            _ => return Err(self.error(format!("expected identifier, found {}", self.found()))),
        }
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let ident = &self.input[start..self.pos];
        if KEYWORDS.contains(&ident) {
            return Err(ParseError::new(
                format!("'{}' is a keyword and cannot be used as a name", ident),
                start,
            ));
        }
        Ok(ident.to_string())
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError::new("expected number", start));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| ParseError::new(format!("invalid number: {}", num_str), start))
    }

    /// Number with an optional leading minus, used for parameter defaults.
    fn parse_signed_number(&mut self) -> Result<f64, ParseError> {
        let negative = self.consume_char('-');
        let value = self.parse_number()?;
        Ok(if negative { -value } else { value })
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error(format!("expected string, found {}", self.found()))),
        };
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(value),
                Some('\n') | None => {
                    return Err(ParseError::new("unterminated string literal", start));
                }
                Some(ch) => value.push(ch),
            }
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.descend("expression")?;
        let expr = self.parse_or()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        loop {
            self.skip_whitespace();
            let position = self.pos;
            if !self.consume_keyword("or") {
                self.depth = base;
                return Ok(left);
            }
            self.descend("expression")?;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_not()?;
        loop {
            self.skip_whitespace();
            let position = self.pos;
            if !self.consume_keyword("and") {
                self.depth = base;
                return Ok(left);
            }
            self.descend("expression")?;
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let position = self.pos;
        if self.consume_keyword("not") {
            self.descend("expression")?;
            let expr = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
                position,
            });
        }
        self.parse_comparison()
    }

    fn peek_comparison(&self) -> Option<(BinaryOp, usize)> {
        let rest = self.remaining();
        if rest.starts_with("<=") {
            Some((BinaryOp::Le, 2))
        } else if rest.starts_with(">=") {
            Some((BinaryOp::Ge, 2))
        } else if rest.starts_with("==") {
            Some((BinaryOp::Eq, 2))
        } else if rest.starts_with("!=") {
            Some((BinaryOp::Ne, 2))
        } else if rest.starts_with('<') {
            Some((BinaryOp::Lt, 1))
        } else if rest.starts_with('>') {
            Some((BinaryOp::Gt, 1))
        } else {
            None
        }
    }

    /// Comparisons do not chain: `a < b < c` is rejected.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        self.skip_whitespace();
        let position = self.pos;
        let Some((op, len)) = self.peek_comparison() else {
            return Ok(left);
        };
        self.pos += len;
        let right = self.parse_additive()?;

        self.skip_whitespace();
        if self.peek_comparison().is_some() {
            return Err(self.error("comparisons cannot be chained; combine them with 'and'"));
        }

        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            position,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_whitespace();
            let position = self.pos;
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.descend("expression")?;
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let position = self.pos;
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                Some('%') => BinaryOp::Rem,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.descend("expression")?;
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let position = self.pos;
        if self.peek() == Some('-') {
            self.descend("expression")?;
            self.advance();
            let expr = self.parse_unary()?;
            self.depth -= 1;
            return Ok(match expr {
                Expr::Number(v) => Expr::Number(-v),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(other),
                    position,
                },
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            let position = self.pos;
            match self.peek() {
                Some('[') => {
                    self.descend("expression")?;
                    self.advance();
                    self.skip_whitespace();
                    let index = if matches!(self.peek(), Some('"' | '\'')) {
                        let position = self.pos;
                        Expr::Str {
                            value: self.parse_string()?,
                            position,
                        }
                    } else {
                        self.parse_expr()?
                    };
                    self.expect_char(']')?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        position,
                    };
                }
                Some('.') => {
                    self.descend("expression")?;
                    self.advance();
                    let name = self.parse_identifier()?;
                    expr = Expr::Field {
                        target: Box::new(expr),
                        name,
                        position,
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let position = self.pos;

        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => {
                return Ok(Expr::Number(self.parse_number()?));
            }
            Some('(') => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_char(')')?;
                return Ok(expr);
            }
            Some('"' | '\'') => {
                return Err(self.error("string literals are only allowed as column keys inside [...]"));
            }
            None => return Err(self.error("expected expression, found end of input")),
            _ => {}
        }

        if self.consume_keyword("true") {
            return Ok(Expr::Bool(true));
        }
        if self.consume_keyword("false") {
            return Ok(Expr::Bool(false));
        }

        let word = self.peek_word();
        if !word.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            return Err(self.error(format!("expected expression, found '{}'", word)));
        }

        let name = self.parse_identifier()?;
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.advance();
            let mut args = Vec::new();
            if !self.consume_char(')') {
                args.push(self.parse_expr()?);
                while !self.consume_char(')') {
                    self.expect_char(',')?;
                    args.push(self.parse_expr()?);
                }
            }
            return Ok(Expr::Call {
                name,
                args,
                position,
            });
        }

        Ok(Expr::Var { name, position })
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_char('{')?;
        self.descend("block")?;
        let mut stmts = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.advance();
                    self.depth -= 1;
                    return Ok(stmts);
                }
                None => return Err(self.error("expected '}', found end of input")),
                _ => stmts.push(self.parse_stmt()?),
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.skip_whitespace();
        let position = self.pos;

        if self.consume_keyword("let") {
            let name = self.parse_identifier()?;
            self.expect_char('=')?;
            let value = self.parse_expr()?;
            self.expect_char(';')?;
            return Ok(Stmt::Let {
                name,
                value,
                position,
            });
        }

        if self.peek_keyword("if") {
            return self.parse_if();
        }

        if self.consume_keyword("return") {
            let first = self.parse_expr()?;
            self.expect_char(',')?;
            let second = self.parse_expr()?;
            self.skip_whitespace();
            if self.peek() == Some(',') {
                return Err(self.error("return takes exactly two values"));
            }
            self.expect_char(';')?;
            return Ok(Stmt::Return {
                first,
                second,
                position,
            });
        }

        if self.peek_word().starts_with(|c: char| c.is_alphabetic() || c == '_') {
            let name = self.parse_identifier()?;
            self.skip_whitespace();
            if self.peek() == Some('=') && !self.remaining().starts_with("==") {
                self.advance();
                let value = self.parse_expr()?;
                self.expect_char(';')?;
                return Ok(Stmt::Assign {
                    name,
                    value,
                    position,
                });
            }
            return Err(ParseError::new(
                format!("expected assignment to '{}'", name),
                position,
            ));
        }

        Err(self.error(format!("expected statement, found {}", self.found())))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        branches.push((cond, body));

        let mut otherwise = None;
        while self.consume_keyword("else") {
            if self.consume_keyword("if") {
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else {
                otherwise = Some(self.parse_block()?);
                break;
            }
        }

        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    // ── Definition ──────────────────────────────────────────────────────

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        self.skip_whitespace();
        let position = self.pos;
        let name = self.parse_identifier()?;
        let default = if self.consume_char('=') {
            Some(self.parse_signed_number()?)
        } else {
            None
        };
        Ok(Param {
            name,
            default,
            position,
        })
    }

    fn parse_function(&mut self) -> Result<FunctionDef, ParseError> {
        self.skip_whitespace();
        let position = self.pos;
        self.expect_keyword("def")?;
        let name = self.parse_identifier()?;
        self.expect_char('(')?;

        let mut params = Vec::new();
        if !self.consume_char(')') {
            params.push(self.parse_param()?);
            while !self.consume_char(')') {
                self.expect_char(',')?;
                params.push(self.parse_param()?);
            }
        }

        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            params,
            body,
            position,
        })
    }

    fn parse(&mut self) -> Result<FunctionDef, ParseError> {
        let def = self.parse_function()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after function definition: {}",
                self.found()
            )));
        }
        Ok(def)
    }
}

pub fn parse(input: &str) -> Result<FunctionDef, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
