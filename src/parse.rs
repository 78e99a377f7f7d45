use log::debug;
use once_cell::sync::Lazy;
use pest::error::{ErrorVariant, InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::expression::{BinaryOp, Expression, UnaryOp};

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct ExpressionParser;

/// Default for [`Limits::max_length`], in bytes.
pub const MAX_EXPRESSION_LENGTH: usize = 2048;

/// Default for [`Limits::max_depth`].
pub const MAX_NESTING_DEPTH: usize = 64;

/// Bounds on the input accepted by [`Expression::parse_with_limits`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Longest accepted input, in bytes.
    pub max_length: usize,
    /// Deepest accepted nesting of brackets and prefix operators.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_length: MAX_EXPRESSION_LENGTH,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// Failure to turn text into an [`Expression`].
///
/// Columns are 1-based and count characters.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid syntax at column {column}: {message}")]
    Syntax { column: usize, message: String },
    #[error("unsupported construct at column {column}: {construct}")]
    UnsupportedConstruct { column: usize, construct: String },
    #[error("expression exceeds the maximum {resource} of {limit}")]
    ResourceLimitExceeded { resource: &'static str, limit: usize },
}

impl Expression {
    /// Parse the expression from `input` with the default [`Limits`].
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Self::parse_with_limits(input, &Limits::default())
    }

    /// Parse the expression from `input`.
    ///
    /// Names are not checked against the constant and function tables here;
    /// that happens during evaluation.
    pub fn parse_with_limits(input: &str, limits: &Limits) -> Result<Self, ParseError> {
        debug!("Parsing expression: {input}");
        check_limits(input, limits)?;

        let mut pairs = ExpressionParser::parse(Rule::calculation, input)
            .map_err(|error| syntax_error(error, input))?
            .flat_map(|calculation| calculation.into_inner());
        let statement = pairs.next();
        if let Some(semicolon) = pairs.find(|p| p.as_rule() == Rule::semicolon) {
            return Err(unsupported(&semicolon, "multiple statements"));
        }
        let expression = match statement {
            Some(statement) => build_statement(statement)?,
            None => unreachable!("a calculation always holds a statement"),
        };
        debug!("Parsed {expression} (depth {})", expression.depth());
        Ok(expression)
    }
}

/// Rejects inputs that are too long or nested too deeply before the grammar,
/// which recurses on nesting, ever sees them.
fn check_limits(input: &str, limits: &Limits) -> Result<(), ParseError> {
    if input.len() > limits.max_length {
        return Err(ParseError::ResourceLimitExceeded {
            resource: "length",
            limit: limits.max_length,
        });
    }

    // Prefix operators still waiting for their operand, per open bracket.
    let mut enclosing_prefixes = Vec::new();
    let mut enclosing_total = 0;
    let mut prefixes = 0;
    let mut expects_operand = true;
    for c in input.chars() {
        match c {
            c if c.is_whitespace() => continue,
            '(' | '[' | '{' => {
                enclosing_prefixes.push(prefixes);
                enclosing_total += prefixes;
                prefixes = 0;
                expects_operand = true;
            }
            ')' | ']' | '}' => {
                enclosing_total -= enclosing_prefixes.pop().unwrap_or(0);
                prefixes = 0;
                expects_operand = false;
            }
            '+' | '-' | '~' if expects_operand => prefixes += 1,
            c if c.is_alphanumeric() || matches!(c, '_' | '.' | '"' | '\'') => {
                prefixes = 0;
                expects_operand = false;
            }
            _ => expects_operand = true,
        }
        if enclosing_prefixes.len() + enclosing_total + prefixes > limits.max_depth {
            return Err(ParseError::ResourceLimitExceeded {
                resource: "nesting depth",
                limit: limits.max_depth,
            });
        }
    }
    Ok(())
}

static PRATT_PARSER: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    use Assoc::*;
    use Rule::*;

    // Lowest precedence first. Only the arithmetic levels are ever evaluated;
    // the others exist so that rejected operators still group sensibly.
    PrattParser::new()
        .op(Op::infix(or_op, Left))
        .op(Op::infix(and_op, Left))
        .op(Op::prefix(not_op))
        .op(Op::infix(compare, Left))
        .op(Op::infix(bit_or, Left))
        .op(Op::infix(bit_xor, Left))
        .op(Op::infix(bit_and, Left))
        .op(Op::infix(shift, Left))
        .op(Op::infix(add, Left) | Op::infix(sub, Left))
        .op(Op::infix(mul, Left)
            | Op::infix(div, Left)
            | Op::infix(floor_div, Left)
            | Op::infix(modulo, Left)
            | Op::infix(mat_mul, Left))
        .op(Op::prefix(neg) | Op::prefix(pos) | Op::prefix(invert))
        .op(Op::infix(pow, Right))
        .op(Op::postfix(attribute) | Op::postfix(subscript) | Op::postfix(invocation))
});

fn build_statement(pair: Pair<Rule>) -> Result<Expression, ParseError> {
    let mut inner = pair.into_inner();
    match (inner.next(), inner.next()) {
        (Some(list), None) => build_expression_list(list),
        (Some(list), Some(op)) => {
            let construct = if op.as_str() == "=" {
                "assignment".to_string()
            } else {
                format!("augmented assignment '{}'", op.as_str())
            };
            Err(unsupported(&list, construct))
        }
        (None, _) => unreachable!("a statement always holds an expression list"),
    }
}

fn build_expression_list(pair: Pair<Rule>) -> Result<Expression, ParseError> {
    let mut inner = pair.clone().into_inner();
    match (inner.next(), inner.next()) {
        (Some(expression), None) => build_expression(expression),
        _ => Err(unsupported(&pair, "tuple")),
    }
}

fn build_expression(pair: Pair<Rule>) -> Result<Expression, ParseError> {
    let mut inner = pair.into_inner();
    match (inner.next(), inner.next()) {
        (Some(body), None) if body.as_rule() == Rule::expr => build_expr(body),
        (Some(body), Some(_)) if body.as_rule() == Rule::expr => {
            Err(unsupported(&body, "conditional expression"))
        }
        (Some(lambda), None) if lambda.as_rule() == Rule::lambda => {
            Err(unsupported(&lambda, "lambda expression"))
        }
        _ => unreachable!("malformed expression"),
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<Expression, ParseError> {
    PRATT_PARSER
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::neg => UnaryOp::Minus,
                Rule::pos => UnaryOp::Plus,
                Rule::invert => return Err(unsupported(&op, "bitwise operator '~'")),
                Rule::not_op => return Err(unsupported(&op, "boolean operator 'not'")),
                x => unreachable!("Unexpected prefix operator {x:?}"),
            };
            Ok(Expression::unary(op, operand?))
        })
        .map_infix(|lhs, op, rhs| {
            let lhs = lhs?;
            let op = binary_op(&op)?;
            Ok(Expression::binary(op, lhs, rhs?))
        })
        .map_postfix(|lhs, op| {
            let lhs = lhs?;
            match op.as_rule() {
                Rule::invocation => match lhs {
                    Expression::Identifier(name) => build_call(name, op),
                    _ => Err(unsupported(&op, "call of a non-function expression")),
                },
                Rule::attribute => Err(unsupported(
                    &op,
                    format!("attribute access '{}'", op.as_str()),
                )),
                Rule::subscript => Err(unsupported(&op, "subscript")),
                x => unreachable!("Unexpected postfix operator {x:?}"),
            }
        })
        .parse(pair.into_inner())
}

fn build_primary(pair: Pair<Rule>) -> Result<Expression, ParseError> {
    match pair.as_rule() {
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(Expression::Literal)
            .map_err(|_| ParseError::Syntax {
                column: column(&pair),
                message: format!("invalid number '{}'", pair.as_str()),
            }),
        Rule::ident => Ok(Expression::Identifier(pair.as_str().to_string())),
        Rule::parenthesized => {
            let mut inner = pair.clone().into_inner();
            match (inner.next(), inner.next()) {
                (Some(expression), None) => build_expression(expression),
                _ => Err(unsupported(&pair, "tuple")),
            }
        }
        Rule::string => Err(unsupported(&pair, "string literal")),
        Rule::list => Err(unsupported(&pair, "list literal")),
        Rule::braces => {
            let mut inner = pair.clone().into_inner();
            let is_set = inner.peek().is_some() && inner.all(|p| p.as_rule() != Rule::colon);
            Err(unsupported(
                &pair,
                if is_set { "set literal" } else { "dict literal" },
            ))
        }
        x => unreachable!("Unexpected primary rule {x:?}"),
    }
}

fn binary_op(op: &Pair<Rule>) -> Result<BinaryOp, ParseError> {
    let construct = match op.as_rule() {
        Rule::add => return Ok(BinaryOp::Add),
        Rule::sub => return Ok(BinaryOp::Sub),
        Rule::mul => return Ok(BinaryOp::Mul),
        Rule::div => return Ok(BinaryOp::Div),
        Rule::floor_div => return Ok(BinaryOp::FloorDiv),
        Rule::modulo => return Ok(BinaryOp::Mod),
        Rule::pow => return Ok(BinaryOp::Pow),
        Rule::compare => "comparison operator",
        Rule::and_op | Rule::or_op => "boolean operator",
        Rule::bit_and | Rule::bit_or | Rule::bit_xor | Rule::shift => "bitwise operator",
        Rule::mat_mul => "matrix multiplication operator",
        x => unreachable!("Unexpected infix operator {x:?}"),
    };
    // `not in` and `is not` may be spelled with any amount of whitespace.
    let symbol = op.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
    Err(unsupported(op, format!("{construct} '{symbol}'")))
}

/// Builds a direct call of `name`; `invocation` holds the argument list.
fn build_call(name: String, invocation: Pair<Rule>) -> Result<Expression, ParseError> {
    let args = invocation.into_inner();
    for arg in args.clone() {
        match arg.as_rule() {
            Rule::expression => {}
            Rule::keyword_argument => {
                let keyword = arg.clone().into_inner().next().map_or("", |k| k.as_str());
                return Err(unsupported(&arg, format!("keyword argument '{keyword}'")));
            }
            Rule::starred => return Err(unsupported(&arg, "starred argument")),
            x => unreachable!("Unexpected argument rule {x:?}"),
        }
    }
    let args = args.map(build_expression).collect::<Result<Vec<_>, _>>()?;
    Ok(Expression::Call(name, args))
}

fn column(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().1
}

fn unsupported(pair: &Pair<Rule>, construct: impl Into<String>) -> ParseError {
    ParseError::UnsupportedConstruct {
        column: column(pair),
        construct: construct.into(),
    }
}

fn syntax_error(error: pest::error::Error<Rule>, input: &str) -> ParseError {
    let column = match error.line_col {
        LineColLocation::Pos((_, column)) | LineColLocation::Span((_, column), _) => column,
    };
    let position = match error.location {
        InputLocation::Pos(position) | InputLocation::Span((position, _)) => position,
    };
    let found = match input.get(position..).and_then(|rest| rest.chars().next()) {
        Some(c) => format!("unexpected '{c}'"),
        None => "unexpected end of input".to_string(),
    };
    let expected = match &error.variant {
        ErrorVariant::ParsingError { positives, .. } => describe_expected(positives),
        ErrorVariant::CustomError { .. } => None,
    };
    let message = match expected {
        Some(expected) => format!("{found}, expected {expected}"),
        None => found,
    };
    ParseError::Syntax { column, message }
}

fn describe_expected(rules: &[Rule]) -> Option<String> {
    let mut descriptions: Vec<&str> = Vec::new();
    for rule in rules {
        let description = match rule {
            Rule::EOI => "end of input",
            Rule::number
            | Rule::ident
            | Rule::string
            | Rule::parenthesized
            | Rule::list
            | Rule::braces
            | Rule::neg
            | Rule::pos
            | Rule::invert
            | Rule::not_op
            | Rule::kw_not
            | Rule::lambda
            | Rule::kw_lambda
            | Rule::statement
            | Rule::expression_list
            | Rule::expression
            | Rule::expr
            | Rule::keyword_argument
            | Rule::starred => "an operand",
            _ => "an operator",
        };
        if !descriptions.contains(&description) {
            descriptions.push(description);
        }
    }
    match descriptions.as_slice() {
        [] => None,
        [only] => Some(only.to_string()),
        [init @ .., last] => Some(format!("{} or {last}", init.join(", "))),
    }
}
