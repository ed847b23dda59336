// Guard expressions - parsed, not string-sliced

//! # Guard Evaluation
//!
//! Transitions may carry a guard: a short expression evaluated against a
//! simulation context before the transition is allowed to fire. The
//! grammar is deliberately small:
//!
//! ```text
//! guard   := operand ( cmp-op operand )?
//! operand := number | boolean | quoted-string | identifier
//! cmp-op  := "==" | "!=" | ">=" | "<=" | ">" | "<"
//! ```
//!
//! A bare identifier resolves through the context and is tested for
//! truthiness; a comparison resolves both sides and compares them.
//! Identifiers may be dotted (`order.total`), matching context keys
//! verbatim.
//!
//! ## Fail-closed
//!
//! Evaluation is the one place in the crate where an error is recovered
//! locally: a guard that cannot be evaluated (malformed expression,
//! missing key in a comparison, ordered comparison on booleans, kind
//! mismatch under `<`/`>`) is treated as **false** and logged at `warn!`.
//! Aborting a whole simulation over one ambiguous expression would be
//! worse than taking the safe branch.
//!
//! Inhibitor *conditions* are simpler: a map of context keys to expected
//! values, where any match blocks the transition.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::{PetriflowError, Result};

/// The context guards and inhibitor conditions are evaluated against
pub type GuardContext = HashMap<String, Value>;

/// Comparison operators of the guard grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    fn is_ordered(&self) -> bool {
        matches!(self, CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le)
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        };
        write!(f, "{}", s)
    }
}

/// One side of a guard expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Numeric literal
    Number(f64),

    /// Boolean literal
    Bool(bool),

    /// Quoted string literal
    Str(String),

    /// Context key, resolved at evaluation time
    Ident(String),
}

/// A parsed guard
#[derive(Debug, Clone, PartialEq)]
pub enum GuardExpr {
    /// Bare operand, tested for truthiness
    Truthy(Operand),

    /// Two operands under a comparison operator
    Compare(Operand, CmpOp, Operand),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Operand(Operand),
    Op(CmpOp),
}

/// Tokenize a guard expression
fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '=' | '!' | '<' | '>' => {
                let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let (op, len) = match two.as_str() {
                    "==" => (CmpOp::Eq, 2),
                    "!=" => (CmpOp::Ne, 2),
                    ">=" => (CmpOp::Ge, 2),
                    "<=" => (CmpOp::Le, 2),
                    _ if c == '>' => (CmpOp::Gt, 1),
                    _ if c == '<' => (CmpOp::Lt, 1),
                    _ => {
                        return Err(PetriflowError::GuardEval(format!(
                            "unexpected character '{}' in guard '{}'",
                            c, input
                        )))
                    }
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(PetriflowError::GuardEval(format!(
                        "unterminated string literal in guard '{}'",
                        input
                    )));
                }
                let s: String = chars[start..end].iter().collect();
                tokens.push(Token::Operand(Operand::Str(s)));
                i = end + 1;
            }
            _ if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| {
                    PetriflowError::GuardEval(format!(
                        "malformed number '{}' in guard '{}'",
                        text, input
                    ))
                })?;
                tokens.push(Token::Operand(Operand::Number(n)));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let operand = match word.as_str() {
                    "true" => Operand::Bool(true),
                    "false" => Operand::Bool(false),
                    _ => Operand::Ident(word),
                };
                tokens.push(Token::Operand(operand));
            }
            _ => {
                return Err(PetriflowError::GuardEval(format!(
                    "unexpected character '{}' in guard '{}'",
                    c, input
                )))
            }
        }
    }

    Ok(tokens)
}

/// Parse a guard expression into its AST
pub fn parse(input: &str) -> Result<GuardExpr> {
    let tokens = tokenize(input)?;
    let mut iter = tokens.into_iter();

    let lhs = match iter.next() {
        Some(Token::Operand(op)) => op,
        _ => {
            return Err(PetriflowError::GuardEval(format!(
                "guard '{}' must start with an operand",
                input
            )))
        }
    };

    match iter.next() {
        None => Ok(GuardExpr::Truthy(lhs)),
        Some(Token::Op(op)) => {
            let rhs = match iter.next() {
                Some(Token::Operand(operand)) => operand,
                _ => {
                    return Err(PetriflowError::GuardEval(format!(
                        "guard '{}' is missing a right-hand operand",
                        input
                    )))
                }
            };
            if iter.next().is_some() {
                return Err(PetriflowError::GuardEval(format!(
                    "guard '{}' has trailing tokens",
                    input
                )));
            }
            Ok(GuardExpr::Compare(lhs, op, rhs))
        }
        Some(Token::Operand(_)) => Err(PetriflowError::GuardEval(format!(
            "guard '{}' has two operands without an operator",
            input
        ))),
    }
}

/// A context value resolved to one of the comparable kinds
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Number(f64),
    Bool(bool),
    Str(String),
    Null,
}

fn resolve(operand: &Operand, ctx: &GuardContext) -> Result<Resolved> {
    match operand {
        Operand::Number(n) => Ok(Resolved::Number(*n)),
        Operand::Bool(b) => Ok(Resolved::Bool(*b)),
        Operand::Str(s) => Ok(Resolved::Str(s.clone())),
        Operand::Ident(key) => match ctx.get(key) {
            None => Ok(Resolved::Null),
            Some(Value::Null) => Ok(Resolved::Null),
            Some(Value::Bool(b)) => Ok(Resolved::Bool(*b)),
            Some(Value::Number(n)) => n.as_f64().map(Resolved::Number).ok_or_else(|| {
                PetriflowError::GuardEval(format!("context value '{}' is not a finite number", key))
            }),
            Some(Value::String(s)) => Ok(Resolved::Str(s.clone())),
            Some(other) => Err(PetriflowError::GuardEval(format!(
                "context value '{}' has non-scalar kind: {}",
                key, other
            ))),
        },
    }
}

fn truthy(value: &Resolved) -> bool {
    match value {
        Resolved::Null => false,
        Resolved::Bool(b) => *b,
        Resolved::Number(n) => *n != 0.0,
        Resolved::Str(s) => !s.is_empty(),
    }
}

/// Evaluate a parsed guard against a context
///
/// Errors (rather than `Ok(false)`) are reserved for expressions that
/// cannot be decided: a missing key in a comparison, an ordered operator
/// over booleans, or mismatched kinds under an ordered operator.
pub fn evaluate(expr: &GuardExpr, ctx: &GuardContext) -> Result<bool> {
    match expr {
        GuardExpr::Truthy(operand) => Ok(truthy(&resolve(operand, ctx)?)),
        GuardExpr::Compare(lhs, op, rhs) => {
            let left = resolve(lhs, ctx)?;
            let right = resolve(rhs, ctx)?;

            if left == Resolved::Null || right == Resolved::Null {
                return Err(PetriflowError::GuardEval(format!(
                    "comparison '{}' resolves a missing context key",
                    render(lhs, *op, rhs)
                )));
            }

            match (&left, &right) {
                (Resolved::Number(a), Resolved::Number(b)) => Ok(compare_ordered(*a, *b, *op)),
                (Resolved::Str(a), Resolved::Str(b)) => Ok(match op {
                    CmpOp::Eq => a == b,
                    CmpOp::Ne => a != b,
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                }),
                (Resolved::Bool(a), Resolved::Bool(b)) => {
                    if op.is_ordered() {
                        Err(PetriflowError::GuardEval(format!(
                            "ordered comparison '{}' over booleans",
                            render(lhs, *op, rhs)
                        )))
                    } else {
                        Ok(match op {
                            CmpOp::Eq => a == b,
                            _ => a != b,
                        })
                    }
                }
                _ => {
                    // Mismatched kinds: decidable for equality, not for order
                    if op.is_ordered() {
                        Err(PetriflowError::GuardEval(format!(
                            "ordered comparison '{}' over mismatched kinds",
                            render(lhs, *op, rhs)
                        )))
                    } else {
                        Ok(matches!(op, CmpOp::Ne))
                    }
                }
            }
        }
    }
}

fn compare_ordered(a: f64, b: f64, op: CmpOp) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
    }
}

fn render(lhs: &Operand, op: CmpOp, rhs: &Operand) -> String {
    format!("{:?} {} {:?}", lhs, op, rhs)
}

/// Parse and evaluate a guard, failing closed
///
/// This is the entry point the simulator uses: any parse or evaluation
/// error yields `false` and a `warn!`, never an abort.
pub fn evaluate_guard(guard: &str, ctx: &GuardContext) -> bool {
    match parse(guard).and_then(|expr| evaluate(&expr, ctx)) {
        Ok(result) => result,
        Err(err) => {
            warn!(guard, error = %err, "guard evaluation failed; treating as false");
            false
        }
    }
}

/// Evaluate a transition's inhibitor conditions against a context
///
/// The transition is inhibited iff any stored context value is
/// numerically `>=` a numeric expected value, equal to a boolean expected
/// value, or string-equal to a string expected value. Missing keys never
/// inhibit.
pub fn is_inhibited(conditions: &HashMap<String, Value>, ctx: &GuardContext) -> bool {
    conditions.iter().any(|(key, expected)| {
        let Some(stored) = ctx.get(key) else {
            return false;
        };
        match expected {
            Value::Number(n) => match (stored.as_f64(), n.as_f64()) {
                (Some(actual), Some(threshold)) => actual >= threshold,
                _ => false,
            },
            Value::Bool(b) => stored.as_bool() == Some(*b),
            Value::String(s) => stored.as_str() == Some(s.as_str()),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, Value)]) -> GuardContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_bare_identifier() {
        let expr = parse("approved").unwrap();
        assert_eq!(expr, GuardExpr::Truthy(Operand::Ident("approved".into())));
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse("retries >= 3").unwrap();
        assert_eq!(
            expr,
            GuardExpr::Compare(
                Operand::Ident("retries".into()),
                CmpOp::Ge,
                Operand::Number(3.0)
            )
        );
    }

    #[test]
    fn test_parse_string_literals() {
        let single = parse("choice == 'a'").unwrap();
        let double = parse("choice == \"a\"").unwrap();
        assert_eq!(single, double);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("== 3").is_err());
        assert!(parse("a == ").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("a == b == c").is_err());
        assert!(parse("'unterminated").is_err());
    }

    #[test]
    fn test_truthiness() {
        let context = ctx(&[
            ("yes", json!(true)),
            ("no", json!(false)),
            ("count", json!(2)),
            ("zero", json!(0)),
            ("name", json!("x")),
            ("blank", json!("")),
        ]);

        assert!(evaluate_guard("yes", &context));
        assert!(!evaluate_guard("no", &context));
        assert!(evaluate_guard("count", &context));
        assert!(!evaluate_guard("zero", &context));
        assert!(evaluate_guard("name", &context));
        assert!(!evaluate_guard("blank", &context));
        // Missing key fails closed
        assert!(!evaluate_guard("missing", &context));
    }

    #[test]
    fn test_numeric_comparisons() {
        let context = ctx(&[("retries", json!(3))]);

        assert!(evaluate_guard("retries == 3", &context));
        assert!(evaluate_guard("retries >= 3", &context));
        assert!(evaluate_guard("retries > 2", &context));
        assert!(evaluate_guard("retries < 4", &context));
        assert!(evaluate_guard("retries <= 3", &context));
        assert!(!evaluate_guard("retries != 3", &context));
        assert!(!evaluate_guard("retries > 3", &context));
    }

    #[test]
    fn test_string_comparisons() {
        let context = ctx(&[("choice", json!("a"))]);

        assert!(evaluate_guard("choice == 'a'", &context));
        assert!(!evaluate_guard("choice == 'b'", &context));
        assert!(evaluate_guard("choice != 'b'", &context));
        // Lexical ordering
        assert!(evaluate_guard("choice < 'b'", &context));
    }

    #[test]
    fn test_boolean_comparisons() {
        let context = ctx(&[("approved", json!(true))]);

        assert!(evaluate_guard("approved == true", &context));
        assert!(evaluate_guard("approved != false", &context));
        // Ordered comparison over booleans cannot be decided: fail closed
        assert!(!evaluate_guard("approved > false", &context));
    }

    #[test]
    fn test_literal_only_guards() {
        let context = GuardContext::new();
        assert!(evaluate_guard("1 < 2", &context));
        assert!(evaluate_guard("true", &context));
        assert!(!evaluate_guard("0", &context));
        assert!(evaluate_guard("'a' != 'b'", &context));
    }

    #[test]
    fn test_missing_key_in_comparison_fails_closed() {
        let context = GuardContext::new();
        assert!(!evaluate_guard("missing == 1", &context));
        assert!(!evaluate_guard("missing != 1", &context));
    }

    #[test]
    fn test_mismatched_kinds() {
        let context = ctx(&[("count", json!(2))]);
        // Equality across kinds is decidable
        assert!(!evaluate_guard("count == 'two'", &context));
        assert!(evaluate_guard("count != 'two'", &context));
        // Order across kinds is not
        assert!(!evaluate_guard("count > 'two'", &context));
    }

    #[test]
    fn test_dotted_identifiers() {
        let context = ctx(&[("order.total", json!(120))]);
        assert!(evaluate_guard("order.total > 100", &context));
    }

    #[test]
    fn test_negative_numbers() {
        let context = ctx(&[("delta", json!(-5))]);
        assert!(evaluate_guard("delta < 0", &context));
        assert!(evaluate_guard("delta == -5", &context));
    }

    #[test]
    fn test_inhibitor_numeric_threshold() {
        let conditions: HashMap<String, Value> =
            [("failures".to_string(), json!(3))].into_iter().collect();

        assert!(!is_inhibited(&conditions, &ctx(&[("failures", json!(2))])));
        assert!(is_inhibited(&conditions, &ctx(&[("failures", json!(3))])));
        assert!(is_inhibited(&conditions, &ctx(&[("failures", json!(7))])));
        // Missing key never inhibits
        assert!(!is_inhibited(&conditions, &GuardContext::new()));
    }

    #[test]
    fn test_inhibitor_bool_and_string() {
        let conditions: HashMap<String, Value> = [
            ("circuit_open".to_string(), json!(true)),
            ("mode".to_string(), json!("maintenance")),
        ]
        .into_iter()
        .collect();

        assert!(is_inhibited(
            &conditions,
            &ctx(&[("circuit_open", json!(true))])
        ));
        assert!(!is_inhibited(
            &conditions,
            &ctx(&[("circuit_open", json!(false))])
        ));
        assert!(is_inhibited(&conditions, &ctx(&[("mode", json!("maintenance"))])));
        assert!(!is_inhibited(&conditions, &ctx(&[("mode", json!("live"))])));
    }
}
