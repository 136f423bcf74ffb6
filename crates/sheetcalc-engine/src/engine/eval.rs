//! Arithmetic formula parsing and evaluation.
//!
//! Formulas are tokenized, parsed by a small recursive-descent parser into an
//! [`Expr`] tree and evaluated recursively. Only numeric literals,
//! parentheses, unary minus and the binary operators `+ - * /` evaluate.
//! A handful of other operator characters (`% & | ^ !`) are recognized by the
//! parser so that they fail as arithmetic errors instead of syntax errors.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-' | '^' | '|') term)*
//! term    := unary (('*' | '/' | '%' | '&') unary)*
//! unary   := ('-' | '+' | '!' | '^') unary | primary
//! primary := NUMBER | '(' expr ')'
//! ```

use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors produced while parsing or evaluating a formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("{0}")]
    Arithmetic(String),
}

impl EvalError {
    fn parse(position: usize, message: impl Into<String>) -> Self {
        EvalError::Parse {
            position,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Recognized operator character with no arithmetic meaning.
    Unsupported(char),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Unsupported(char),
}

/// Parsed formula tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(char),
    LParen,
    RParen,
}

const OPERATOR_CHARS: &[char] = &['+', '-', '*', '/', '%', '&', '|', '^', '!'];
const ADDITIVE_OPS: &[char] = &['+', '-', '^', '|'];
const MULTIPLICATIVE_OPS: &[char] = &['*', '/', '%', '&'];
const UNARY_OPS: &[char] = &['-', '+', '!', '^'];

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, EvalError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                i = scan_number(bytes, i);
                let literal = &input[start..i];
                let n = literal.parse::<f64>().map_err(|_| {
                    EvalError::parse(start, format!("invalid number literal '{}'", literal))
                })?;
                tokens.push((Token::Number(n), start));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                return Err(EvalError::parse(
                    start,
                    format!("unexpected identifier '{}'", &input[start..i]),
                ));
            }
            c if OPERATOR_CHARS.contains(&(c as char)) => {
                tokens.push((Token::Op(c as char), i));
                i += 1;
            }
            _ => {
                let ch = input[i..].chars().next().unwrap_or('?');
                return Err(EvalError::parse(i, format!("unexpected character '{}'", ch)));
            }
        }
    }

    Ok(tokens)
}

/// Scan `digits [. digits] [e [+-] digits]` starting at `start`, returning the end offset.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        // Only an exponent if digits follow; otherwise leave `e` for the caller.
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn next_op_in(&self, set: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if set.contains(&c) => Some(c),
            _ => None,
        }
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.term()?;
        while let Some(c) = self.next_op_in(ADDITIVE_OPS) {
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op: binary_op(c),
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        while let Some(c) = self.next_op_in(MULTIPLICATIVE_OPS) {
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary {
                op: binary_op(c),
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if let Some(c) = self.next_op_in(UNARY_OPS) {
            self.pos += 1;
            let operand = self.unary()?;
            let op = if c == '-' {
                UnaryOp::Neg
            } else {
                UnaryOp::Unsupported(c)
            };
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let position = self.position();
        match self.peek() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(EvalError::parse(self.position(), "expected ')'")),
                }
            }
            Some(Token::RParen) => Err(EvalError::parse(position, "unexpected ')'")),
            Some(Token::Op(c)) => Err(EvalError::parse(
                position,
                format!("unexpected operator '{}'", c),
            )),
            None => Err(EvalError::parse(position, "unexpected end of expression")),
        }
    }
}

fn binary_op(c: char) -> BinaryOp {
    match c {
        '+' => BinaryOp::Add,
        '-' => BinaryOp::Sub,
        '*' => BinaryOp::Mul,
        '/' => BinaryOp::Div,
        other => BinaryOp::Unsupported(other),
    }
}

/// Parse a normalized formula body (no leading `=`) into an expression tree.
pub fn parse(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::parse(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(EvalError::parse(parser.position(), "unexpected trailing token"));
    }
    Ok(expr)
}

/// Evaluate a parsed expression tree.
pub fn evaluate(expr: &Expr) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand)?;
            match op {
                UnaryOp::Neg => Ok(-value),
                UnaryOp::Unsupported(_) => {
                    Err(EvalError::Arithmetic("unsupported unary operator".to_string()))
                }
            }
        }
        Expr::Binary { op, left, right } => {
            let x = evaluate(left)?;
            let y = evaluate(right)?;
            match op {
                BinaryOp::Add => Ok(x + y),
                BinaryOp::Sub => Ok(x - y),
                BinaryOp::Mul => Ok(x * y),
                BinaryOp::Div => {
                    if y == 0.0 {
                        return Err(EvalError::Arithmetic("division by zero".to_string()));
                    }
                    Ok(x / y)
                }
                BinaryOp::Unsupported(_) => {
                    Err(EvalError::Arithmetic("unsupported operator".to_string()))
                }
            }
        }
    }
}

fn sign_run_re() -> &'static Regex {
    static SIGN_RUN_RE: OnceLock<Regex> = OnceLock::new();
    SIGN_RUN_RE.get_or_init(|| Regex::new(r"[+-]+").expect("sign run regex must compile"))
}

/// Collapse every run of `+`/`-` into a single sign and drop a leading `=+`.
///
/// A run with an odd number of `-` becomes `-`, otherwise `+`.
pub fn clean_expression(expr: &str) -> String {
    let collapsed = sign_run_re().replace_all(expr, |caps: &Captures| {
        if caps[0].matches('-').count() % 2 == 0 {
            "+".to_string()
        } else {
            "-".to_string()
        }
    });
    if let Some(rest) = collapsed.strip_prefix("=+") {
        return format!("={}", rest);
    }
    collapsed.into_owned()
}

/// Normalize, parse and evaluate a formula. A single leading `=` is optional.
pub fn calculate(expr: &str) -> Result<f64, EvalError> {
    let cleaned = clean_expression(expr);
    let body = cleaned.strip_prefix('=').unwrap_or(&cleaned);
    let tree = parse(body)?;
    evaluate(&tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arithmetic(msg: &str) -> EvalError {
        EvalError::Arithmetic(msg.to_string())
    }

    #[test]
    fn test_basic_operations() {
        assert_eq!(calculate("=1+2").unwrap(), 3.0);
        assert_eq!(calculate("=7-4").unwrap(), 3.0);
        assert_eq!(calculate("=3*3").unwrap(), 9.0);
        assert_eq!(calculate("=8/2").unwrap(), 4.0);
        assert_eq!(calculate("=10.5/2").unwrap(), 5.25);
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(calculate("=2+3*4").unwrap(), 14.0);
        assert_eq!(calculate("=(3+2)*(2+3)").unwrap(), 25.0);
        assert_eq!(calculate("=(((3+2)*2)+4)/(2+1)").unwrap(), 14.0 / 3.0);
        assert_eq!(calculate("=10-4-3").unwrap(), 3.0);
        assert_eq!(calculate("=64/4/2").unwrap(), 8.0);
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(calculate("=-3+4").unwrap(), 1.0);
        assert_eq!(calculate("=-((3+2)*2)").unwrap(), -10.0);
        assert_eq!(calculate("=2*-3").unwrap(), -6.0);
        assert_eq!(calculate("=-0").unwrap(), 0.0);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(calculate("= 5 + 2").unwrap(), 7.0);
        assert_eq!(calculate("=5+2      ").unwrap(), 7.0);
        assert_eq!(calculate("=5   +   2").unwrap(), 7.0);
    }

    #[test]
    fn test_scientific_notation_and_extremes() {
        assert_eq!(
            calculate("=4.940656458412465441765687928682213723651e-324").unwrap(),
            4.940656458412465441765687928682213723651e-324
        );
        assert_eq!(calculate("=1.5e3+.5").unwrap(), 1500.5);
        assert_eq!(calculate("=5/0.00000000000000000001").unwrap(), 5e20);
        assert_eq!(
            calculate("=1.797693134862315708145274237317043567981e+308 * 2").unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            calculate("=-1.797693134862315708145274237317043567981e+308 * 2").unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(calculate("=5/0"), Err(arithmetic("division by zero")));
        assert_eq!(calculate("=8/(2-2)"), Err(arithmetic("division by zero")));
    }

    #[test]
    fn test_unsupported_operators() {
        assert_eq!(calculate("=8^0"), Err(arithmetic("unsupported operator")));
        assert_eq!(calculate("=8%3"), Err(arithmetic("unsupported operator")));
        assert_eq!(calculate("=8&3"), Err(arithmetic("unsupported operator")));
    }

    #[test]
    fn test_unsupported_unary_operators() {
        assert_eq!(calculate("+5"), Err(arithmetic("unsupported unary operator")));
        assert_eq!(calculate("=2*+3"), Err(arithmetic("unsupported unary operator")));
        assert_eq!(calculate("=!1"), Err(arithmetic("unsupported unary operator")));
    }

    #[test]
    fn test_malformed_syntax() {
        for expr in ["=5*", "=", "=-", "=(1+2", "=1+2)", "=1 2", "=x+1", "=1$2", "=."] {
            assert!(
                matches!(calculate(expr), Err(EvalError::Parse { .. })),
                "expected parse error for {expr}"
            );
        }
    }

    #[test]
    fn test_parse_error_reports_position() {
        match calculate("=1+abc") {
            Err(EvalError::Parse { position, message }) => {
                assert_eq!(position, 2);
                assert!(message.contains("abc"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_calculate_is_deterministic() {
        let a = calculate("=0.1+0.2*3/7").unwrap();
        let b = calculate("=0.1+0.2*3/7").unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_clean_expression() {
        assert_eq!(clean_expression("=x+y"), "=x+y");
        assert_eq!(clean_expression("=-x+y"), "=-x+y");
        assert_eq!(clean_expression(""), "");
        assert_eq!(clean_expression("=--x+y"), "=x+y");
        assert_eq!(clean_expression("=---x"), "=-x");
        assert_eq!(clean_expression("=x+-+y"), "=x-y");
        assert_eq!(clean_expression("=x-+-y"), "=x+y");
        assert_eq!(clean_expression("=+5"), "=5");
    }

    #[test]
    fn test_parse_builds_left_associative_tree() {
        let tree = parse("1-2-3").unwrap();
        assert_eq!(
            tree,
            Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    left: Box::new(Expr::Number(1.0)),
                    right: Box::new(Expr::Number(2.0)),
                }),
                right: Box::new(Expr::Number(3.0)),
            }
        );
    }
}
