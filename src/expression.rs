use std::fmt;

/// A parsed calculation.
///
/// Only the shapes below are representable; everything else the grammar
/// recognises is rejected while the tree is being built.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    // Numeric literal.
    Literal(f64),

    // Named constant, resolved against the constant table at evaluation time.
    Identifier(String),

    // Unary sign.
    Unary(UnaryOp, Box<Expression>),

    // Binary arithmetic.
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    // Call of a named function with positional arguments.
    Call(String, Vec<Expression>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl Expression {
    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// Number of nodes on the longest path from this node to a leaf.
    pub fn depth(&self) -> usize {
        match self {
            Self::Literal(_) | Self::Identifier(_) => 1,
            Self::Unary(_, operand) => 1 + operand.depth(),
            Self::Binary(_, lhs, rhs) => 1 + lhs.depth().max(rhs.depth()),
            Self::Call(_, args) => 1 + args.iter().map(Self::depth).max().unwrap_or(0),
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
        }
    }
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Renders the tree with every compound node parenthesised, so the output
/// shows how precedence and associativity were resolved.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Identifier(name) => f.write_str(name),
            Self::Unary(op, operand) => write!(f, "({op}{operand})"),
            Self::Binary(op, lhs, rhs) => write!(f, "({lhs} {op} {rhs})"),
            Self::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
