//! Calculator Tool
//!
//! Evaluates a single arithmetic expression with a small recursive-descent
//! parser. Only numbers, arithmetic operators, parentheses, `pi`, `e` and a
//! fixed set of math functions are understood; there is nothing to execute.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Result;
use crate::tool::Tool;

/// Calculator tool - evaluates mathematical expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates one arithmetic expression. args: the expression as text, e.g. \
         '(3 + 4) * 2 ^ 3' or 'sqrt(16) + log10(1000)'. Supports + - * / % ^ ** and \
         the functions sqrt, abs, sin, cos, tan, asin, acos, atan, exp, ln, log, \
         log10, log2, floor, ceil, round and the constants pi and e."
    }

    async fn run(&self, args: &str) -> Result<String> {
        let expr = args.trim();
        match evaluate(expr) {
            Ok(value) => Ok(format!("{expr} = {}", format_number(value))),
            Err(e) => {
                tracing::debug!(expression = %expr, error = %e, "Calculator rejected expression");
                Ok(format!("Error evaluating expression '{expr}': {e}"))
            }
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
    #[error("expression is nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Nesting limit for parentheses, unary signs and exponent chains
pub const MAX_DEPTH: usize = 256;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Ident(s) => f.write_str(s),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Caret => f.write_str("^"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // scientific notation: 1e3, 2.5E-4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' | '^' | '(' | ')' => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
                i += 1;
            }
            other => return Err(EvalError::UnexpectedChar(other)),
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

    fn expect(&mut self, expected: &Token) -> std::result::Result<(), EvalError> {
        match self.next() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(EvalError::UnexpectedToken(t.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> std::result::Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> std::result::Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    value = value.rem_euclid(rhs);
                }
                _ => return Ok(value),
            }
        }
    }

    // every nesting level passes through here, so this is where depth is bounded
    fn unary(&mut self) -> std::result::Result<f64, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    // unary := ('+' | '-') unary | power
    fn signed(&mut self) -> std::result::Result<f64, EvalError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   (right associative, binds tighter than unary minus on its left)
    fn power(&mut self) -> std::result::Result<f64, EvalError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> std::result::Result<f64, EvalError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect(&Token::RParen)?;
                    apply_function(&name, arg)
                } else {
                    constant(&name)
                }
            }
            Some(t) => Err(EvalError::UnexpectedToken(t.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

fn constant(name: &str) -> std::result::Result<f64, EvalError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        _ => Err(EvalError::UnknownName(name.to_string())),
    }
}

fn apply_function(name: &str, x: f64) -> std::result::Result<f64, EvalError> {
    let value = match name {
        "sqrt" => x.sqrt(),
        "abs" => x.abs(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "asin" => x.asin(),
        "acos" => x.acos(),
        "atan" => x.atan(),
        "exp" => x.exp(),
        "ln" | "log" => x.ln(),
        "log10" => x.log10(),
        "log2" => x.log2(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        "round" => x.round(),
        _ => return Err(EvalError::UnknownName(name.to_string())),
    };
    Ok(value)
}

/// Evaluate an arithmetic expression
pub fn evaluate(expr: &str) -> std::result::Result<f64, EvalError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(EvalError::UnexpectedToken(extra.to_string()));
    }
    if !value.is_finite() {
        return Err(EvalError::NotFinite);
    }
    Ok(value)
}

/// Integral results print without a fractional part
#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
