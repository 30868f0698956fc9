//! Evaluator for the passphrase expression embedded in Batoto chapter pages.
//!
//! The site writes the passphrase as an obfuscated JavaScript expression
//! built from literals, `[]`, `!`, `+` and friends (`+!+[]` is `1`,
//! `[+!+[]]+[]` is `"1"`). Only that closed grammar is accepted:
//!
//! ```text
//! expr     := additive
//! additive := mult (('+' | '-') mult)*
//! mult     := unary (('*' | '/' | '%') unary)*
//! unary    := ('!' | '+' | '-') unary | postfix
//! postfix  := primary ('[' expr ']')*
//! primary  := number | string | '(' expr ')' | '[' (expr (',' expr)*)? ']'
//! ```
//!
//! Identifiers, calls, member access and every other construct are rejected.
//!
//! Number handling is decimal only: exponent literals such as `1e3` do not
//! tokenize, and string-to-number coercion yields `NaN` for `"Infinity"` and
//! hex strings like `"0x1f"`. Both fail closed as a wrong passphrase.

use std::fmt;

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Array(Vec<Value>),
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError(pub String);

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ExprError {}

impl Value {
    /// JavaScript `ToString`
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Undefined => "undefined".to_string(),
        }
    }

    /// JavaScript `ToNumber`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Str(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_js_string()),
            Value::Undefined => f64::NAN,
        }
    }

    /// JavaScript `ToBoolean`
    pub fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Array(_) => true,
            Value::Undefined => false,
        }
    }

    /// Arrays become strings, everything else is already primitive
    fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) => Value::Str(self.to_js_string()),
            other => other.clone(),
        }
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
        s.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
}

fn punctuation(c: char) -> Option<Token> {
    let token = match c {
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        '(' => Token::LParen,
        ')' => Token::RParen,
        ',' => Token::Comma,
        '+' => Token::Plus,
        '-' => Token::Minus,
        '*' => Token::Star,
        '/' => Token::Slash,
        '%' => Token::Percent,
        '!' => Token::Bang,
        _ => return None,
    };
    Some(token)
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            c if punctuation(c).is_some() => {
                tokens.extend(punctuation(c));
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError(format!("bad number literal '{}'", literal)))?;
                tokens.push(Token::Number(n));
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(ExprError("unterminated string literal".to_string()));
                    };
                    i += 1;
                    match ch {
                        ch if ch == quote => break,
                        '\\' => {
                            let escaped = chars
                                .get(i)
                                .ok_or_else(|| ExprError("unterminated escape".to_string()))?;
                            i += 1;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                        }
                        other => s.push(other),
                    }
                }
                tokens.push(Token::Str(s));
            }
            other => return Err(ExprError(format!("unsupported character '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            other => Err(ExprError(format!("expected {:?}, found {:?}", expected, other))),
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError("expression nested too deeply".to_string()));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Value, ExprError> {
        self.enter()?;
        let mut left = self.mult()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    let right = self.mult()?;
                    left = add(&left, &right);
                }
                Token::Minus => {
                    self.pos += 1;
                    let right = self.mult()?;
                    left = Value::Number(left.to_number() - right.to_number());
                }
                _ => break,
            }
        }
        self.depth -= 1;
        Ok(left)
    }

    fn mult(&mut self) -> Result<Value, ExprError> {
        let mut left = self.unary()?;
        while let Some(op) = self.peek().cloned() {
            let apply: fn(f64, f64) -> f64 = match op {
                Token::Star => |a, b| a * b,
                Token::Slash => |a, b| a / b,
                Token::Percent => |a, b| a % b,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Value::Number(apply(left.to_number(), right.to_number()));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value, ExprError> {
        self.enter()?;
        let value = match self.peek() {
            Some(Token::Bang) => {
                self.pos += 1;
                Value::Bool(!self.unary()?.truthy())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                Value::Number(self.unary()?.to_number())
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Value::Number(-self.unary()?.to_number())
            }
            _ => self.postfix()?,
        };
        self.depth -= 1;
        Ok(value)
    }

    fn postfix(&mut self) -> Result<Value, ExprError> {
        let mut value = self.primary()?;
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            let index = self.expr()?;
            self.expect(Token::RBracket)?;
            value = index_into(&value, &index);
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<Value, ExprError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.peek() == Some(&Token::RBracket) {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                loop {
                    items.push(self.expr()?);
                    match self.next() {
                        Some(Token::Comma) => continue,
                        Some(Token::RBracket) => break,
                        other => return Err(ExprError(format!("expected ',' or ']', found {:?}", other))),
                    }
                }
                Ok(Value::Array(items))
            }
            other => Err(ExprError(format!("unexpected token {:?}", other))),
        }
    }
}

fn add(left: &Value, right: &Value) -> Value {
    let (l, r) = (left.to_primitive(), right.to_primitive());
    if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
        Value::Str(l.to_js_string() + &r.to_js_string())
    } else {
        Value::Number(l.to_number() + r.to_number())
    }
}

fn index_into(value: &Value, index: &Value) -> Value {
    let n = index.to_number();
    if n < 0.0 || n.fract() != 0.0 || n.is_nan() {
        return Value::Undefined;
    }
    let i = n as usize;
    match value {
        Value::Str(s) => s
            .chars()
            .nth(i)
            .map(|c| Value::Str(c.to_string()))
            .unwrap_or(Value::Undefined),
        Value::Array(items) => items.get(i).cloned().unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    }
}

/// Evaluate an expression of the accepted grammar
pub fn evaluate(source: &str) -> Result<Value, ExprError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExprError("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError(format!("trailing input at token {}", parser.pos)));
    }
    Ok(value)
}

/// Evaluate and coerce to a string, as the page does before decrypting
pub fn evaluate_to_string(source: &str) -> Result<String, ExprError> {
    evaluate(source).map(|v| v.to_js_string())
}
