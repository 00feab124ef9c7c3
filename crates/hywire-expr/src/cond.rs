//! Conditional expressions
//!
//! Bracketed `[...]` trigger conditionals compile to this typed AST and
//! run in a closed-world interpreter: a fixed operator set and an
//! injected `Scope` for identifier resolution. There is no "evaluate
//! text as code" path.
//!
//! Resolution rule: a bare identifier (or its `.`-member chain) is
//! resolved against the event context first, then the global scope —
//! that split lives in the engine's `Scope` implementation. An
//! identifier preceded by `.` is always a member access.

use crate::{ExprError, Token};

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    /// Truthiness for predicate results
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

/// Identifier resolution, supplied by the caller
pub trait Scope {
    /// Resolve a dotted path (`["event", "key"]` for `event.key`).
    /// `None` means undefined; the interpreter treats it as null.
    fn resolve(&self, path: &[String]) -> Option<Value>;
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Typed conditional expression
#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    Literal(Value),
    /// Dotted identifier path, resolved through the scope
    Path(Vec<String>),
    Unary(UnaryOp, Box<CondExpr>),
    Binary(BinaryOp, Box<CondExpr>, Box<CondExpr>),
}

/// Evaluation error (the engine treats these as "block")
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Type error: {0}")]
    TypeError(String),
}

impl CondExpr {
    /// Evaluate against a scope
    pub fn eval(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        match self {
            CondExpr::Literal(v) => Ok(v.clone()),
            CondExpr::Path(path) => Ok(scope.resolve(path).unwrap_or(Value::Null)),
            CondExpr::Unary(op, inner) => {
                let v = inner.eval(scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOp::Neg => match v {
                        Value::Num(n) => Ok(Value::Num(-n)),
                        other => Err(EvalError::TypeError(format!("cannot negate {other:?}"))),
                    },
                }
            }
            CondExpr::Binary(op, lhs, rhs) => {
                match op {
                    BinaryOp::And => {
                        let l = lhs.eval(scope)?;
                        if !l.is_truthy() {
                            return Ok(l);
                        }
                        return rhs.eval(scope);
                    }
                    BinaryOp::Or => {
                        let l = lhs.eval(scope)?;
                        if l.is_truthy() {
                            return Ok(l);
                        }
                        return rhs.eval(scope);
                    }
                    _ => {}
                }
                let l = lhs.eval(scope)?;
                let r = rhs.eval(scope)?;
                match op {
                    BinaryOp::Eq => Ok(Value::Bool(l == r)),
                    BinaryOp::Ne => Ok(Value::Bool(l != r)),
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                        let (a, b) = as_numbers(&l, &r)?;
                        Ok(Value::Bool(match op {
                            BinaryOp::Lt => a < b,
                            BinaryOp::Le => a <= b,
                            BinaryOp::Gt => a > b,
                            _ => a >= b,
                        }))
                    }
                    BinaryOp::Add => match (&l, &r) {
                        (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
                        (Value::Str(a), b) => Ok(Value::Str(format!("{a}{}", display(b)))),
                        (a, Value::Str(b)) => Ok(Value::Str(format!("{}{b}", display(a)))),
                        _ => Err(EvalError::TypeError("cannot add these values".to_string())),
                    },
                    BinaryOp::Sub => {
                        let (a, b) = as_numbers(&l, &r)?;
                        Ok(Value::Num(a - b))
                    }
                    BinaryOp::And | BinaryOp::Or => unreachable!(),
                }
            }
        }
    }
}

fn as_numbers(l: &Value, r: &Value) -> Result<(f64, f64), EvalError> {
    match (l, r) {
        (Value::Num(a), Value::Num(b)) => Ok((*a, *b)),
        _ => Err(EvalError::TypeError(format!("expected numbers, got {l:?} and {r:?}"))),
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => n.to_string(),
        Value::Str(s) => s.clone(),
    }
}

/// Compile a token stream (the bracket body) into a CondExpr
pub fn compile_condition(tokens: &[Token]) -> Result<CondExpr, ExprError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return Err(ExprError::UnexpectedToken(tokens[parser.pos].text()));
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn eat_sym(&mut self, c: char) -> bool {
        if matches!(self.peek(), Some(t) if t.is_sym(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_sym2(&mut self, a: char, b: char) -> bool {
        if matches!(self.tokens.get(self.pos), Some(t) if t.is_sym(a))
            && matches!(self.tokens.get(self.pos + 1), Some(t) if t.is_sym(b))
        {
            self.pos += 2;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<CondExpr, ExprError> {
        let mut lhs = self.and_expr()?;
        while self.eat_sym2('|', '|') {
            let rhs = self.and_expr()?;
            lhs = CondExpr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<CondExpr, ExprError> {
        let mut lhs = self.equality()?;
        while self.eat_sym2('&', '&') {
            let rhs = self.equality()?;
            lhs = CondExpr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<CondExpr, ExprError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = if self.eat_sym2('=', '=') {
                BinaryOp::Eq
            } else if self.eat_sym2('!', '=') {
                BinaryOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.comparison()?;
            lhs = CondExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn comparison(&mut self) -> Result<CondExpr, ExprError> {
        let mut lhs = self.additive()?;
        loop {
            let op = if self.eat_sym2('<', '=') {
                BinaryOp::Le
            } else if self.eat_sym2('>', '=') {
                BinaryOp::Ge
            } else if self.eat_sym('<') {
                BinaryOp::Lt
            } else if self.eat_sym('>') {
                BinaryOp::Gt
            } else {
                return Ok(lhs);
            };
            let rhs = self.additive()?;
            lhs = CondExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<CondExpr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_sym('+') {
                BinaryOp::Add
            } else if self.eat_sym('-') {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = CondExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<CondExpr, ExprError> {
        if self.eat_sym('!') {
            return Ok(CondExpr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat_sym('-') {
            return Ok(CondExpr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<CondExpr, ExprError> {
        let Some(token) = self.advance() else { return Err(ExprError::UnexpectedEnd) };
        let mut expr = match token {
            Token::Number(n) => {
                let value: f64 = n.parse().map_err(|_| ExprError::UnexpectedToken(n.clone()))?;
                CondExpr::Literal(Value::Num(value))
            }
            Token::Str(s) => CondExpr::Literal(Value::Str(s.clone())),
            Token::Ident(name) => match name.as_str() {
                "true" => CondExpr::Literal(Value::Bool(true)),
                "false" => CondExpr::Literal(Value::Bool(false)),
                "null" => CondExpr::Literal(Value::Null),
                _ => CondExpr::Path(vec![name.clone()]),
            },
            Token::Sym('(') => {
                let inner = self.or_expr()?;
                if !self.eat_sym(')') {
                    return Err(ExprError::UnexpectedEnd);
                }
                inner
            }
            other => return Err(ExprError::UnexpectedToken(other.text())),
        };

        // Member access: `.name` extends the path; never a free variable
        while self.eat_sym('.') {
            let Some(Token::Ident(member)) = self.advance() else {
                return Err(ExprError::UnexpectedEnd);
            };
            match &mut expr {
                CondExpr::Path(path) => path.push(member.clone()),
                _ => return Err(ExprError::UnexpectedToken(member.clone())),
            }
        }
        Ok(expr)
    }
}
