//! Formula Abstract Syntax Tree types
//!
//! Every node renders back to a canonical formula string through [`fmt::Display`].

use crate::value::{format_number, Value};
use std::fmt;
use std::sync::OnceLock;

/// Precedence of the comparison operators
pub const LOGICAL_PRECEDENCE: u8 = 1;
/// Precedence of `^`
pub const POWER_PRECEDENCE: u8 = 4;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Number or string literal
    Value(Value),
    /// Parenthesized sub-expression, kept for rendering
    Bracket(Box<Expression>),
    /// `+ - * /`
    Arithmetic {
        op: ArithmeticOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `base ^ exponent`
    Power {
        base: Box<Expression>,
        exponent: Box<Expression>,
    },
    /// Comparison, evaluating to 1 or 0
    Logical {
        op: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    FunctionCall(FunctionCall),
    Variable(NamePath),
}

impl Expression {
    pub fn number(n: f64) -> Self {
        Expression::Value(Value::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expression::Value(Value::String(s.into()))
    }

    pub fn variable(name: &str) -> Self {
        Expression::Variable(NamePath::parse(name))
    }

    pub fn bracket(inner: Expression) -> Self {
        Expression::Bracket(Box::new(inner))
    }

    /// Build the node for `left <op> right`
    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        match op {
            BinaryOperator::Arithmetic(op) => Expression::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            BinaryOperator::Power => Expression::Power {
                base: Box::new(left),
                exponent: Box::new(right),
            },
            BinaryOperator::Logical(op) => Expression::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// The binary operator at the root of this node, if any
    pub fn operator(&self) -> Option<BinaryOperator> {
        match self {
            Expression::Arithmetic { op, .. } => Some(BinaryOperator::Arithmetic(*op)),
            Expression::Power { .. } => Some(BinaryOperator::Power),
            Expression::Logical { op, .. } => Some(BinaryOperator::Logical(*op)),
            _ => None,
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            ArithmeticOperator::Add | ArithmeticOperator::Subtract => 2,
            ArithmeticOperator::Multiply | ArithmeticOperator::Divide => 3,
        }
    }

    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            ArithmeticOperator::Add => left + right,
            ArithmeticOperator::Subtract => left - right,
            ArithmeticOperator::Multiply => left * right,
            ArithmeticOperator::Divide => left / right,
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl LogicalOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOperator::Less => "<",
            LogicalOperator::Greater => ">",
            LogicalOperator::LessEqual => "<=",
            LogicalOperator::GreaterEqual => ">=",
            LogicalOperator::Equal => "=",
            LogicalOperator::NotEqual => "!=",
        }
    }

    /// `<`, `>`, `<=`, `>=` need ordered operands
    pub fn is_ordering(self) -> bool {
        !matches!(self, LogicalOperator::Equal | LogicalOperator::NotEqual)
    }
}

/// Any operator that joins two sub-expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Arithmetic(ArithmeticOperator),
    Power,
    Logical(LogicalOperator),
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Arithmetic(op) => op.symbol(),
            BinaryOperator::Power => "^",
            BinaryOperator::Logical(op) => op.symbol(),
        }
    }

    // Precedence (lowest to highest):
    // 1. Comparison: <, >, <=, >=, =, !=
    // 2. Addition/Subtraction: +, -
    // 3. Multiplication/Division: *, /
    // 4. Exponentiation: ^ (right associative)
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Arithmetic(op) => op.precedence(),
            BinaryOperator::Power => POWER_PRECEDENCE,
            BinaryOperator::Logical(_) => LOGICAL_PRECEDENCE,
        }
    }

    pub fn is_right_associative(self) -> bool {
        self == BinaryOperator::Power
    }

    /// Whether a right operand built with `child` must keep parentheses under `self`
    fn wraps_right(self, child: BinaryOperator) -> bool {
        let (parent_prec, child_prec) = (self.precedence(), child.precedence());
        if child_prec != parent_prec {
            return child_prec < parent_prec;
        }
        // Same precedence: only regroupable chains may drop the parentheses.
        !matches!(
            (self, child),
            (
                BinaryOperator::Arithmetic(ArithmeticOperator::Add),
                BinaryOperator::Arithmetic(ArithmeticOperator::Add)
            ) | (
                BinaryOperator::Arithmetic(ArithmeticOperator::Multiply),
                BinaryOperator::Arithmetic(ArithmeticOperator::Multiply)
            ) | (BinaryOperator::Power, BinaryOperator::Power)
        )
    }
}

/// A variable or function name, split on `.`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamePath {
    segments: Vec<String>,
}

impl NamePath {
    pub fn parse(name: &str) -> Self {
        Self {
            segments: name.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The dotted name (`a.b.c`)
    pub fn name(&self) -> String {
        self.segments.join(".")
    }

    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }

    /// Can the name be written without `[...]`
    fn is_bare(name: &str) -> bool {
        let mut chars = name.chars();
        chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    }
}

impl fmt::Display for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if Self::is_bare(&name) {
            f.write_str(&name)
        } else {
            write!(f, "[{}]", name)
        }
    }
}

/// A call like `sin(x)` or `lib.inverse(x, 2)`
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub path: NamePath,
    pub args: Vec<Expression>,
    /// Blacklist verdict, computed on the first tier-2 lookup
    blacklisted: OnceLock<bool>,
}

impl FunctionCall {
    pub fn new(path: NamePath, args: Vec<Expression>) -> Self {
        Self {
            path,
            args,
            blacklisted: OnceLock::new(),
        }
    }

    pub fn name(&self) -> String {
        self.path.name()
    }

    pub(crate) fn is_blacklisted(&self) -> bool {
        *self
            .blacklisted
            .get_or_init(|| crate::blacklist::is_blacklisted(&self.path.name()))
    }
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.args == other.args
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

fn write_binary(
    f: &mut fmt::Formatter<'_>,
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
) -> fmt::Result {
    write!(f, "{} {} ", left, op.symbol())?;
    match right.operator() {
        Some(child) if op.wraps_right(child) => write!(f, "({})", right),
        _ => write!(f, "{}", right),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Value(Value::Number(n)) => f.write_str(&format_number(*n)),
            Expression::Value(Value::String(s)) => write_string_literal(f, s),
            Expression::Value(other) => write!(f, "{}", other),
            Expression::Bracket(inner) => write!(f, "({})", inner),
            Expression::Arithmetic { op, left, right } => {
                write_binary(f, BinaryOperator::Arithmetic(*op), left, right)
            }
            Expression::Power { base, exponent } => {
                write_binary(f, BinaryOperator::Power, base, exponent)
            }
            Expression::Logical { op, left, right } => {
                write_binary(f, BinaryOperator::Logical(*op), left, right)
            }
            Expression::FunctionCall(call) => {
                write!(f, "{}(", call.path)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expression::Variable(path) => write!(f, "{}", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn add(left: Expression, right: Expression) -> Expression {
        Expression::binary(
            BinaryOperator::Arithmetic(ArithmeticOperator::Add),
            left,
            right,
        )
    }

    fn sub(left: Expression, right: Expression) -> Expression {
        Expression::binary(
            BinaryOperator::Arithmetic(ArithmeticOperator::Subtract),
            left,
            right,
        )
    }

    fn mul(left: Expression, right: Expression) -> Expression {
        Expression::binary(
            BinaryOperator::Arithmetic(ArithmeticOperator::Multiply),
            left,
            right,
        )
    }

    #[test]
    fn test_render_literals() {
        assert_eq!(Expression::number(4.0).to_string(), "4");
        assert_eq!(Expression::number(-0.5).to_string(), "-0.5");
        assert_eq!(Expression::string("foo").to_string(), "\"foo\"");
        assert_eq!(
            Expression::string("say \"hi\" \\o/").to_string(),
            r#""say \"hi\" \\o/""#
        );
    }

    #[test]
    fn test_render_names() {
        assert_eq!(Expression::variable("x").to_string(), "x");
        assert_eq!(Expression::variable("a.b.c").to_string(), "a.b.c");
        assert_eq!(Expression::variable("1st").to_string(), "[1st]");

        let call = Expression::FunctionCall(FunctionCall::new(
            NamePath::parse("lib.inverse"),
            vec![Expression::variable("x"), Expression::number(2.0)],
        ));
        assert_eq!(call.to_string(), "lib.inverse(x, 2)");
    }

    #[test]
    fn test_render_right_child_parentheses() {
        let x = || Expression::variable("x");
        let y = || Expression::variable("y");
        let z = || Expression::variable("z");

        // Regroupable chains drop the parentheses
        assert_eq!(add(x(), add(y(), z())).to_string(), "x + y + z");
        assert_eq!(mul(x(), mul(y(), z())).to_string(), "x * y * z");

        // Everything else at lower or equal precedence keeps them
        assert_eq!(sub(x(), add(y(), z())).to_string(), "x - (y + z)");
        assert_eq!(add(x(), sub(y(), z())).to_string(), "x + (y - z)");
        assert_eq!(mul(x(), add(y(), z())).to_string(), "x * (y + z)");

        // Higher precedence never needs them
        assert_eq!(add(x(), mul(y(), z())).to_string(), "x + y * z");

        // The left child is rendered as-is
        assert_eq!(mul(add(x(), y()), z()).to_string(), "x + y * z");
    }

    #[test]
    fn test_render_power_chain() {
        let chain = Expression::binary(
            BinaryOperator::Power,
            Expression::number(2.0),
            Expression::binary(
                BinaryOperator::Power,
                Expression::number(3.0),
                Expression::number(2.0),
            ),
        );
        assert_eq!(chain.to_string(), "2 ^ 3 ^ 2");
    }

    #[test]
    fn test_render_logical() {
        let expr = Expression::binary(
            BinaryOperator::Logical(LogicalOperator::LessEqual),
            Expression::variable("x"),
            add(Expression::number(1.0), Expression::number(2.0)),
        );
        assert_eq!(expr.to_string(), "x <= 1 + 2");
    }

    #[test]
    fn test_precedence_table() {
        assert_eq!(BinaryOperator::Logical(LogicalOperator::Equal).precedence(), 1);
        assert_eq!(
            BinaryOperator::Arithmetic(ArithmeticOperator::Subtract).precedence(),
            2
        );
        assert_eq!(
            BinaryOperator::Arithmetic(ArithmeticOperator::Divide).precedence(),
            3
        );
        assert_eq!(BinaryOperator::Power.precedence(), 4);
        assert!(BinaryOperator::Power.is_right_associative());
    }
}
