//! Restricted arithmetic expression parser/evaluator.
//!
//! # Why?
//!
//! Safety. A calculator has to accept arbitrary text from its user, and the
//! easy route of handing that text to a general-purpose language evaluator
//! exposes far more than arithmetic. This crate parses a closed grammar of
//! numbers, named constants, named function calls, unary `+`/`-` and the
//! operators `+ - * / // % **`, rejects everything else by name, and evaluates
//! the result in `f64` with explicit errors instead of silent NaNs.
//!
//! # Example
//!
//! ```rust
//! use calc_expr::*;
//!
//! assert_eq!(evaluate_expression("2 ** 3 ** 2").unwrap(), 512.0);
//! assert_eq!(evaluate_expression("-7 // 2").unwrap(), -4.0);
//!
//! let parsed = Expression::parse("factorial(4) + sqrt(16)").unwrap();
//! assert_eq!(parsed.evaluate().unwrap(), 28.0);
//!
//! assert!(matches!(
//!     evaluate_expression("1 / 0"),
//!     Err(Error::Evaluate(EvalError::DivisionByZero(BinaryOp::Div)))
//! ));
//! ```

mod builtins;
mod evaluate;
mod expression;
mod parse;

/// Uses the [`pest`] parsing expression grammar language.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use builtins::*;
pub use evaluate::*;
pub use expression::*;
pub use parse::{Limits, ParseError, MAX_EXPRESSION_LENGTH, MAX_NESTING_DEPTH};

use log::debug;

/// Any failure of [`evaluate_expression`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Evaluate(#[from] EvalError),
}

/// Parses and evaluates `text` in one step.
pub fn evaluate_expression(text: &str) -> Result<f64, Error> {
    let expression = Expression::parse(text)?;
    let value = expression.evaluate()?;
    debug!("Evaluated {expression} = {value}");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn eval(text: &str) -> f64 {
        evaluate_expression(text).unwrap_or_else(|e| panic!("{text:?}: {e}"))
    }

    fn eval_err(text: &str) -> EvalError {
        match evaluate_expression(text) {
            Err(Error::Evaluate(e)) => e,
            other => panic!("{text:?}: expected evaluation error, got {other:?}"),
        }
    }

    #[test]
    fn literal_round_trip() {
        for value in [0.0, 1.0, 42.0, 0.1, 3.25, 1e-7, 6.02214076e23, 123456789.125] {
            assert_eq!(eval(&value.to_string()), value);
            assert_eq!(eval(&format!("{value:e}")), value);
        }
    }

    #[test]
    fn real_op_precedence() {
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("(2 + 3) * 4"), 20.0);
        assert_eq!(eval("2 ** 3 ** 2"), 512.0);
        assert_eq!(eval("-2 ** 2"), -4.0);
        assert_eq!(eval("(-2) ** 2"), 4.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("2 ** -1"), 0.5);
        assert_eq!(eval("+-+3"), -3.0);
        assert_eq!(eval("7 // 2 * 2 + 7 % 2"), 7.0);
    }

    #[test]
    fn constants_and_functions_compose() {
        assert!((eval("sin(pi/2)") - 1.0).abs() < 1e-12);
        assert!((eval("cos(tau)") - 1.0).abs() < 1e-12);
        assert!((eval("log(e)") - 1.0).abs() < 1e-12);
        assert!((eval("deg(pi)") - 180.0).abs() < 1e-9);
        assert!((eval("rad(90)") - PI / 2.0).abs() < 1e-12);
        assert_eq!(eval("factorial(4)"), 24.0);
        assert_eq!(eval("sqrt(16) + fabs(-2)"), 6.0);
        assert_eq!(eval("floor(-2.5) + ceil(2.1)"), 0.0);
        assert_eq!(eval("log10(1000) * log2(8)"), 9.0);
        assert_eq!(eval("factorial(factorial(3))"), 720.0);
    }

    #[test]
    fn floor_semantics_for_negative_operands() {
        assert_eq!(eval("-7 // 2"), -4.0);
        assert_eq!(eval("7 // -2"), -4.0);
        assert_eq!(eval("-7 % 2"), 1.0);
        assert_eq!(eval("7 % -2"), -1.0);
        assert_eq!(eval("-7.5 // 2"), -4.0);
        assert_eq!(eval("-7.5 % 2"), 0.5);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(eval_err("1/0"), EvalError::DivisionByZero(BinaryOp::Div));
        assert_eq!(eval_err("1//0"), EvalError::DivisionByZero(BinaryOp::FloorDiv));
        assert_eq!(eval_err("1%0"), EvalError::DivisionByZero(BinaryOp::Mod));
        assert_eq!(eval_err("1 / (2 - 2)"), EvalError::DivisionByZero(BinaryOp::Div));
        assert_eq!(eval_err("0 ** -1"), EvalError::DivisionByZero(BinaryOp::Pow));
    }

    #[test]
    fn domain_and_argument_errors() {
        assert!(matches!(eval_err("sqrt(-1)"), EvalError::MathDomain(_)));
        assert!(matches!(eval_err("log(0)"), EvalError::MathDomain(_)));
        assert!(matches!(eval_err("acos(2)"), EvalError::MathDomain(_)));
        assert!(matches!(eval_err("(-8) ** (1/3)"), EvalError::MathDomain(_)));
        assert!(matches!(eval_err("factorial(3.5)"), EvalError::InvalidArgument { .. }));
        assert!(matches!(eval_err("factorial(-1)"), EvalError::InvalidArgument { .. }));
        assert!(matches!(eval_err("exp(1000)"), EvalError::Overflow(_)));
        assert!(matches!(eval_err("10 ** 400"), EvalError::Overflow(_)));
    }

    #[test]
    fn unknown_names_and_arity() {
        assert_eq!(eval_err("foo(1)"), EvalError::UnknownFunction("foo".into()));
        assert_eq!(eval_err("bar"), EvalError::UnknownConstant("bar".into()));
        assert_eq!(eval_err("pi(1)"), EvalError::UnknownFunction("pi".into()));
        assert_eq!(eval_err("sin"), EvalError::UnknownConstant("sin".into()));
        assert_eq!(
            eval_err("sin(1,2)"),
            EvalError::Arity {
                function: "sin".into(),
                expected: 1,
                got: 2
            }
        );
        assert!(matches!(eval_err("log(10, 10)"), EvalError::Arity { got: 2, .. }));
        assert!(matches!(eval_err("cos()"), EvalError::Arity { got: 0, .. }));
    }

    #[test]
    fn rejects_constructs_outside_the_grammar() {
        for text in ["[1,2,3]", "1 if True else 2", "x=1", "1 < 2", "a.b", "'s'"] {
            assert!(
                matches!(
                    evaluate_expression(text),
                    Err(Error::Parse(
                        ParseError::UnsupportedConstruct { .. } | ParseError::Syntax { .. }
                    ))
                ),
                "{text}"
            );
        }
        assert!(matches!(
            evaluate_expression("(1 + 2"),
            Err(Error::Parse(ParseError::Syntax { .. }))
        ));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let text = "sin(1) ** 2 + cos(1) ** 2 - factorial(5) / 7 % 3";
        let first = evaluate_expression(text);
        assert_eq!(evaluate_expression(text), first);

        let parsed = Expression::parse(text).unwrap();
        assert_eq!(parsed.evaluate(), parsed.evaluate());
    }

    #[test]
    fn concurrent_evaluation() {
        let handles: Vec<_> = (0..8)
            .map(|i| std::thread::spawn(move || evaluate_expression(&format!("{i} * tau / 2"))))
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.join().unwrap().unwrap();
            assert!((value - i as f64 * PI).abs() < 1e-12);
        }
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            evaluate_expression("bar").unwrap_err().to_string(),
            "unknown constant 'bar'"
        );
        assert_eq!(
            evaluate_expression("1 +").unwrap_err().to_string(),
            "invalid syntax at column 4: unexpected end of input, expected an operand"
        );
        assert_eq!(
            evaluate_expression("factorial(3.5)").unwrap_err().to_string(),
            "factorial() only accepts integral values"
        );
    }
}
