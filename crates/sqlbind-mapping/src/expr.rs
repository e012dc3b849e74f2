//! The test-expression language for conditional SQL fragments.
//!
//! A deliberately small boolean/comparison language over the binding
//! context: property paths, literals, `and`/`or`/`!`, parentheses, and the
//! six comparison operators. A trailing `.size`, `.len`, or `.length`
//! segment on a collection path yields its element count.
//!
//! Compiled forms are memoized in a process-wide first-writer-wins map, so
//! a statement evaluated many times parses its expressions once.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use sqlbind_types::Value;

use crate::context::DynamicContext;
use crate::error::BindingError;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value (`null`, `true`, numbers, quoted strings).
    Literal(Value),
    /// A dotted property path into the binding context.
    Path(Vec<String>),
    /// Logical negation.
    Not(Box<Expr>),
    /// Short-circuit conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// A comparison between two sub-expressions.
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
}

impl Expr {
    /// Parse an expression.
    pub fn parse(text: &str) -> Result<Self, BindingError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
        };
        let expr = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(expr)
    }

    /// Evaluate to a value. Missing properties evaluate to null.
    pub fn eval(&self, ctx: &DynamicContext) -> Result<Value, BindingError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(segments) => Ok(eval_path(segments, ctx)),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(ctx)?))),
            Expr::And(lhs, rhs) => {
                if truthy(&lhs.eval(ctx)?) {
                    Ok(Value::Bool(truthy(&rhs.eval(ctx)?)))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            Expr::Or(lhs, rhs) => {
                if truthy(&lhs.eval(ctx)?) {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(truthy(&rhs.eval(ctx)?)))
                }
            }
            Expr::Cmp(lhs, op, rhs) => {
                let lhs = lhs.eval(ctx)?;
                let rhs = rhs.eval(ctx)?;
                Ok(Value::Bool(compare(&lhs, *op, &rhs)))
            }
        }
    }

    /// Evaluate and reduce to truthiness.
    pub fn eval_bool(&self, ctx: &DynamicContext) -> Result<bool, BindingError> {
        Ok(truthy(&self.eval(ctx)?))
    }
}

/// Truthiness: null and empty collections are false, numbers by non-zero.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(x) => *x != 0.0,
        Value::Text(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Map(entries) => !entries.is_empty(),
    }
}

fn eval_path(segments: &[String], ctx: &DynamicContext) -> Value {
    let full = segments.join(".");
    if let Some(value) = ctx.lookup(&full) {
        return value.clone();
    }
    // A trailing size segment counts the collection it follows.
    if let Some((last, prefix)) = segments.split_last() {
        if matches!(last.as_str(), "size" | "len" | "length") && !prefix.is_empty() {
            let prefix = prefix.join(".");
            if let Some(count) = ctx.lookup(&prefix).and_then(Value::size) {
                return Value::Int(count as i64);
            }
        }
    }
    Value::Null
}

/// Comparison semantics: numbers compare numerically across int/float,
/// text lexicographically. Equality falls back to structural equality;
/// ordering against null or across kinds is false.
fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    use std::cmp::Ordering;
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match op {
        CmpOp::Eq => ordering.map_or(lhs == rhs, |o| o == Ordering::Equal),
        CmpOp::Ne => ordering.map_or(lhs != rhs, |o| o != Ordering::Equal),
        CmpOp::Lt => ordering == Some(Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ordering == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(CmpOp),
    Not,
    And,
    Or,
    Dot,
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, BindingError> {
    let error = |message: &str| BindingError::Expression {
        expression: text.to_string(),
        message: message.to_string(),
    };
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(error("expected =="));
                }
                tokens.push(Token::Op(CmpOp::Eq));
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Le));
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(error("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                let mut is_float = false;
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() {
                        number.push(ch);
                        chars.next();
                    } else if ch == '.' {
                        // Only consume the dot when a digit follows; a
                        // trailing dot belongs to a path like `list.0.size`.
                        let mut ahead = chars.clone();
                        ahead.next();
                        if ahead.peek().is_some_and(char::is_ascii_digit) && !is_float {
                            is_float = true;
                            number.push(ch);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let parsed = number.parse::<f64>().map_err(|_| error("bad number"))?;
                    tokens.push(Token::Float(parsed));
                } else {
                    let parsed = number.parse::<i64>().map_err(|_| error("bad number"))?;
                    tokens.push(Token::Int(parsed));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(ident),
                });
            }
            _ => return Err(error("unexpected character")),
        }
    }
    Ok(tokens)
}

struct Parser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> BindingError {
        BindingError::Expression {
            expression: self.text.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<Expr, BindingError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, BindingError> {
        let mut lhs = self.cmp_expr()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.cmp_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr, BindingError> {
        let lhs = self.unary_expr()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.next();
            let rhs = self.unary_expr()?;
            return Ok(Expr::Cmp(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, BindingError> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.unary_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, BindingError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("expected closing parenthesis"));
                }
                Ok(inner)
            }
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Text(s))),
            Some(Token::Ident(first)) => match first.as_str() {
                "null" => Ok(Expr::Literal(Value::Null)),
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                _ => {
                    let mut segments = vec![first];
                    while self.peek() == Some(&Token::Dot) {
                        self.next();
                        match self.next() {
                            Some(Token::Ident(segment)) => segments.push(segment),
                            Some(Token::Int(index)) => segments.push(index.to_string()),
                            _ => return Err(self.error("expected path segment after '.'")),
                        }
                    }
                    Ok(Expr::Path(segments))
                }
            },
            _ => Err(self.error("expected a value")),
        }
    }
}

/// Memoized compiled expressions, first writer wins.
pub struct ExprCache {
    entries: RwLock<HashMap<String, Arc<Expr>>>,
}

impl ExprCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Parse through the cache.
    pub fn parse(&self, text: &str) -> Result<Arc<Expr>, BindingError> {
        if let Some(compiled) = self.entries.read().get(text) {
            return Ok(Arc::clone(compiled));
        }
        let compiled = Arc::new(Expr::parse(text)?);
        let mut entries = self.entries.write();
        Ok(Arc::clone(
            entries.entry(text.to_string()).or_insert(compiled),
        ))
    }
}

impl Default for ExprCache {
    fn default() -> Self {
        Self::new()
    }
}

static COMPILED: Lazy<ExprCache> = Lazy::new(ExprCache::new);

/// Parse `text` through the process-wide expression cache.
pub fn compile(text: &str) -> Result<Arc<Expr>, BindingError> {
    COMPILED.parse(text)
}
