use crate::builtins::{lookup_constant, lookup_function};
use crate::{BinaryOp, Expression, UnaryOp};

/// Maximum number of nested nodes [`Expression::evaluate`] will descend into.
pub const MAX_EVALUATION_DEPTH: usize = 2048;

/// Failure to evaluate a syntactically valid [`Expression`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown constant '{0}'")]
    UnknownConstant(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{function}() takes exactly {expected} argument(s) ({got} given)")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("{function}() {reason}")]
    InvalidArgument {
        function: String,
        reason: &'static str,
    },
    #[error("division by zero in '{0}'")]
    DivisionByZero(BinaryOp),
    #[error("math domain error in {0}")]
    MathDomain(String),
    #[error("math range error in {0}")]
    Overflow(String),
    #[error("expression exceeds the maximum evaluation depth of {limit}")]
    ResourceLimitExceeded { limit: usize },
}

impl Expression {
    /// Computes the value of the expression.
    ///
    /// Children are evaluated before their parent, left operand before right
    /// operand and arguments in order, so the first failure in that order is
    /// the one reported.
    pub fn evaluate(&self) -> Result<f64, EvalError> {
        self.evaluate_recursive(1)
    }

    fn evaluate_recursive(&self, depth: usize) -> Result<f64, EvalError> {
        if depth > MAX_EVALUATION_DEPTH {
            return Err(EvalError::ResourceLimitExceeded {
                limit: MAX_EVALUATION_DEPTH,
            });
        }
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Identifier(name) => {
                lookup_constant(name).ok_or_else(|| EvalError::UnknownConstant(name.clone()))
            }
            Self::Unary(op, operand) => Ok(op.apply(operand.evaluate_recursive(depth + 1)?)),
            Self::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate_recursive(depth + 1)?;
                let rhs = rhs.evaluate_recursive(depth + 1)?;
                op.apply(lhs, rhs)
            }
            Self::Call(name, args) => {
                let function =
                    lookup_function(name).ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate_recursive(depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                function.apply(&args)
            }
        }
    }
}

impl UnaryOp {
    pub fn apply(self, operand: f64) -> f64 {
        match self {
            Self::Plus => operand,
            Self::Minus => -operand,
        }
    }
}

impl BinaryOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        match self {
            Self::Add => Ok(lhs + rhs),
            Self::Sub => Ok(lhs - rhs),
            Self::Mul => Ok(lhs * rhs),
            Self::Div => {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero(self));
                }
                Ok(lhs / rhs)
            }
            Self::FloorDiv => {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero(self));
                }
                Ok(floor_div_mod(lhs, rhs).0)
            }
            Self::Mod => {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero(self));
                }
                Ok(floor_div_mod(lhs, rhs).1)
            }
            Self::Pow => pow(lhs, rhs),
        }
    }
}

/// Quotient rounded toward negative infinity and the matching remainder,
/// which takes the sign of the divisor. `rhs` must be non-zero.
fn floor_div_mod(lhs: f64, rhs: f64) -> (f64, f64) {
    let mut rem = lhs % rhs;
    // `lhs - rem` is a multiple of `rhs` up to rounding, so this is nearly
    // integral.
    let mut div = (lhs - rem) / rhs;
    if rem != 0.0 {
        if (rhs < 0.0) != (rem < 0.0) {
            rem += rhs;
            div -= 1.0;
        }
    } else {
        rem = 0.0_f64.copysign(rhs);
    }
    let floor_div = if div != 0.0 {
        let floor = div.floor();
        if div - floor > 0.5 {
            floor + 1.0
        } else {
            floor
        }
    } else {
        0.0_f64.copysign(lhs / rhs)
    };
    (floor_div, rem)
}

fn pow(base: f64, exponent: f64) -> Result<f64, EvalError> {
    if exponent == 0.0 {
        return Ok(1.0);
    }
    if base == 0.0 && exponent < 0.0 {
        return Err(EvalError::DivisionByZero(BinaryOp::Pow));
    }
    if base < 0.0 && base.is_finite() && exponent.is_finite() && exponent.fract() != 0.0 {
        // The real result would be complex.
        return Err(EvalError::MathDomain("'**'".to_string()));
    }
    let result = base.powf(exponent);
    if result.is_infinite() && base.is_finite() && exponent.is_finite() {
        return Err(EvalError::Overflow("'**'".to_string()));
    }
    Ok(result)
}
