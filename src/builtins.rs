//! The fixed constant and function tables.
//!
//! Both tables are built once on first use and are read-only afterwards, so
//! lookups need no synchronisation.

use std::collections::HashMap;
use std::f64::consts::{E, PI, TAU};

use log::trace;
use once_cell::sync::Lazy;

use crate::EvalError;

/// Largest `n` whose factorial is finite in `f64`.
const MAX_FACTORIAL: f64 = 170.0;

static CONSTANTS: Lazy<HashMap<&'static str, f64>> =
    Lazy::new(|| HashMap::from([("pi", PI), ("e", E), ("tau", TAU)]));

static FUNCTIONS: Lazy<HashMap<&'static str, Function>> = Lazy::new(|| {
    [
        Function::checked("sin", f64::sin),
        Function::checked("cos", f64::cos),
        Function::checked("tan", f64::tan),
        Function::checked("asin", f64::asin),
        Function::checked("acos", f64::acos),
        Function::checked("atan", f64::atan),
        Function::overflowing("sinh", f64::sinh),
        Function::overflowing("cosh", f64::cosh),
        Function::checked("tanh", f64::tanh),
        Function::checked("sqrt", f64::sqrt),
        Function::checked("log", f64::ln),
        Function::checked("log10", f64::log10),
        Function::checked("log2", f64::log2),
        Function::overflowing("exp", f64::exp),
        Function::unchecked("fabs", f64::abs),
        Function::exact("ceil", ceil),
        Function::exact("floor", floor),
        Function::exact("factorial", factorial),
        Function::unchecked("deg", f64::to_degrees),
        Function::unchecked("rad", f64::to_radians),
    ]
    .into_iter()
    .map(|function| (function.name, function))
    .collect()
});

/// Looks up a named constant.
pub fn lookup_constant(name: &str) -> Option<f64> {
    CONSTANTS.get(name).copied()
}

/// Looks up a named function.
pub fn lookup_function(name: &str) -> Option<&'static Function> {
    FUNCTIONS.get(name)
}

/// An entry of the function table.
#[derive(Clone, Copy, Debug)]
pub struct Function {
    name: &'static str,
    arity: usize,
    body: Body,
}

#[derive(Clone, Copy, Debug)]
enum Body {
    /// A real-valued function whose NaN or infinite results on finite input
    /// are reported as errors.
    Checked {
        f: fn(f64) -> f64,
        can_overflow: bool,
    },
    /// Total on the reals; results are passed through.
    Unchecked(fn(f64) -> f64),
    /// Performs its own argument validation.
    Exact(fn(&'static str, f64) -> Result<f64, EvalError>),
}

impl Function {
    fn checked(name: &'static str, f: fn(f64) -> f64) -> Self {
        Self::unary(
            name,
            Body::Checked {
                f,
                can_overflow: false,
            },
        )
    }

    fn overflowing(name: &'static str, f: fn(f64) -> f64) -> Self {
        Self::unary(
            name,
            Body::Checked {
                f,
                can_overflow: true,
            },
        )
    }

    fn unchecked(name: &'static str, f: fn(f64) -> f64) -> Self {
        Self::unary(name, Body::Unchecked(f))
    }

    fn exact(name: &'static str, f: fn(&'static str, f64) -> Result<f64, EvalError>) -> Self {
        Self::unary(name, Body::Exact(f))
    }

    fn unary(name: &'static str, body: Body) -> Self {
        Self {
            name,
            arity: 1,
            body,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of positional arguments the function takes.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Applies the function to already evaluated arguments.
    pub fn apply(&self, args: &[f64]) -> Result<f64, EvalError> {
        let &[x] = args else {
            return Err(EvalError::Arity {
                function: self.name.to_string(),
                expected: self.arity,
                got: args.len(),
            });
        };
        let result = match self.body {
            Body::Checked { f, can_overflow } => {
                let result = f(x);
                if result.is_nan() && !x.is_nan() {
                    return Err(EvalError::MathDomain(format!("{}()", self.name)));
                }
                if result.is_infinite() && x.is_finite() {
                    return Err(if can_overflow {
                        EvalError::Overflow(format!("{}()", self.name))
                    } else {
                        EvalError::MathDomain(format!("{}()", self.name))
                    });
                }
                result
            }
            Body::Unchecked(f) => f(x),
            Body::Exact(f) => f(self.name, x)?,
        };
        trace!("{}({x}) = {result}", self.name);
        Ok(result)
    }
}

fn ceil(name: &'static str, x: f64) -> Result<f64, EvalError> {
    to_integral(name, x).map(f64::ceil)
}

fn floor(name: &'static str, x: f64) -> Result<f64, EvalError> {
    to_integral(name, x).map(f64::floor)
}

fn to_integral(name: &'static str, x: f64) -> Result<f64, EvalError> {
    if x.is_nan() {
        return Err(EvalError::InvalidArgument {
            function: name.to_string(),
            reason: "cannot convert NaN to an integer",
        });
    }
    if x.is_infinite() {
        return Err(EvalError::Overflow(format!("{name}()")));
    }
    Ok(x)
}

fn factorial(name: &'static str, x: f64) -> Result<f64, EvalError> {
    if !x.is_finite() || x.fract() != 0.0 {
        return Err(EvalError::InvalidArgument {
            function: name.to_string(),
            reason: "only accepts integral values",
        });
    }
    if x < 0.0 {
        return Err(EvalError::InvalidArgument {
            function: name.to_string(),
            reason: "not defined for negative values",
        });
    }
    if x > MAX_FACTORIAL {
        return Err(EvalError::Overflow(format!("{name}()")));
    }
    Ok((2..=x as u32).map(f64::from).product())
}
