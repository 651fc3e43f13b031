//! Abstract Syntax Tree definitions for mathematical expressions
//!
//! Trees are immutable. Children are held behind `Arc`, so every
//! transformation builds a new tree that can share untouched subtrees with
//! its input, and trees can be handed to other threads freely.

use std::fmt;
use std::sync::Arc;

use crate::error::{MathError, MathResult};

/// Named mathematical constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "e",
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in single-argument functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Sqrt,
    /// Natural logarithm
    Log,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Sqrt => "sqrt",
            Function::Log => "log",
        }
    }

    /// Real-valued application; out-of-domain arguments give `NaN`.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Sqrt => x.sqrt(),
            Function::Log => x.ln(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Precedence of negation, between `* /` and `^`
pub(crate) const UNARY_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 5;

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryOp::Pow)
    }

    /// IEEE float semantics: `1/0` is infinite, `(-8)^0.5` is `NaN`.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
            BinaryOp::Pow => left.powf(right),
        }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),

    /// `pi` or `e`
    Constant(Constant),

    /// Variable reference: `x`
    Variable(String),

    /// Negation: `-x`
    Unary { op: UnaryOp, operand: Arc<Expr> },

    /// Arithmetic: `a + b`, `a ^ b`, ...
    Binary {
        op: BinaryOp,
        left: Arc<Expr>,
        right: Arc<Expr>,
    },

    /// Function call: `sin(x)`
    Call {
        function: Function,
        args: Vec<Arc<Expr>>,
    },
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn constant(constant: Constant) -> Self {
        Expr::Constant(constant)
    }

    pub fn neg(operand: impl Into<Arc<Expr>>) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: operand.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: impl Into<Arc<Expr>>, right: impl Into<Arc<Expr>>) -> Self {
        Expr::Binary {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn add(left: impl Into<Arc<Expr>>, right: impl Into<Arc<Expr>>) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: impl Into<Arc<Expr>>, right: impl Into<Arc<Expr>>) -> Self {
        Self::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: impl Into<Arc<Expr>>, right: impl Into<Arc<Expr>>) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn div(left: impl Into<Arc<Expr>>, right: impl Into<Arc<Expr>>) -> Self {
        Self::binary(BinaryOp::Div, left, right)
    }

    pub fn pow(left: impl Into<Arc<Expr>>, right: impl Into<Arc<Expr>>) -> Self {
        Self::binary(BinaryOp::Pow, left, right)
    }

    pub fn call(function: Function, arg: impl Into<Arc<Expr>>) -> Self {
        Expr::Call {
            function,
            args: vec![arg.into()],
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_number(&self, value: f64) -> bool {
        self.as_number() == Some(value)
    }

    /// Does the variable occur anywhere in this tree?
    pub fn contains_variable(&self, name: &str) -> bool {
        match self {
            Expr::Number(_) | Expr::Constant(_) => false,
            Expr::Variable(v) => v == name,
            Expr::Unary { operand, .. } => operand.contains_variable(name),
            Expr::Binary { left, right, .. } => {
                left.contains_variable(name) || right.contains_variable(name)
            }
            Expr::Call { args, .. } => args.iter().any(|arg| arg.contains_variable(name)),
        }
    }

    /// Fail with `DepthExceeded` if the tree is deeper than `max_depth`.
    ///
    /// Recursion stops as soon as the limit is crossed, so this is safe on
    /// arbitrarily deep trees.
    pub fn check_depth(&self, max_depth: usize) -> MathResult<()> {
        self.depth_within(1, max_depth)
    }

    fn depth_within(&self, depth: usize, max_depth: usize) -> MathResult<()> {
        if depth > max_depth {
            return Err(MathError::DepthExceeded { limit: max_depth });
        }
        match self {
            Expr::Number(_) | Expr::Constant(_) | Expr::Variable(_) => Ok(()),
            Expr::Unary { operand, .. } => operand.depth_within(depth + 1, max_depth),
            Expr::Binary { left, right, .. } => {
                left.depth_within(depth + 1, max_depth)?;
                right.depth_within(depth + 1, max_depth)
            }
            Expr::Call { args, .. } => args
                .iter()
                .try_for_each(|arg| arg.depth_within(depth + 1, max_depth)),
        }
    }

    /// Binding strength used when rendering
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => UNARY_PRECEDENCE,
            Expr::Number(n) if *n < 0.0 => UNARY_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }
}

/// Render a number the way the expression language reads it back
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        let magnitude = value.abs();
        if magnitude >= 1e21 || magnitude < 1e-7 {
            // positive exponents carry a sign: `1e+21`
            let text = format!("{:e}", value);
            match text.split_once('e') {
                Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                    format!("{}e+{}", mantissa, exponent)
                }
                _ => text,
            }
        } else {
            format!("{}", value)
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => f.write_str(&format_number(*n)),
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::Variable(name) => f.write_str(name),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                f.write_str("-")?;
                write_operand(f, operand, operand.precedence() < UNARY_PRECEDENCE)
            }
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                let (left_parens, right_parens) = if op.is_right_associative() {
                    // an exponent may be negated directly: `2 ^ -1`
                    let negated = right.precedence() == UNARY_PRECEDENCE;
                    (left.precedence() <= prec, right.precedence() < prec && !negated)
                } else {
                    (left.precedence() < prec, right.precedence() <= prec)
                };
                write_operand(f, left, left_parens)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, right_parens)
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::variable("x")
    }

    #[test]
    fn test_display_inserts_parentheses_only_where_needed() {
        let sum = Expr::add(x(), Expr::number(1.0));
        assert_eq!(Expr::mul(Expr::number(2.0), sum.clone()).to_string(), "2 * (x + 1)");
        assert_eq!(Expr::add(Expr::number(2.0), Expr::mul(x(), x())).to_string(), "2 + x * x");
        assert_eq!(Expr::sub(x(), sum.clone()).to_string(), "x - (x + 1)");
        assert_eq!(Expr::sub(sum, x()).to_string(), "x + 1 - x");
    }

    #[test]
    fn test_display_power_associativity() {
        let right = Expr::pow(x(), Expr::pow(Expr::number(2.0), Expr::number(3.0)));
        let left = Expr::pow(Expr::pow(x(), Expr::number(2.0)), Expr::number(3.0));
        assert_eq!(right.to_string(), "x ^ 2 ^ 3");
        assert_eq!(left.to_string(), "(x ^ 2) ^ 3");
        assert_eq!(Expr::pow(Expr::neg(x()), Expr::number(2.0)).to_string(), "(-x) ^ 2");
        assert_eq!(Expr::neg(Expr::pow(x(), Expr::number(2.0))).to_string(), "-x ^ 2");
        assert_eq!(Expr::pow(Expr::number(-2.0), x()).to_string(), "(-2) ^ x");
        assert_eq!(Expr::pow(Expr::number(2.0), Expr::number(-1.0)).to_string(), "2 ^ -1");
        assert_eq!(Expr::pow(x(), Expr::neg(x())).to_string(), "x ^ -x");
        let sum = Expr::add(x(), Expr::number(1.0));
        assert_eq!(Expr::pow(x(), sum).to_string(), "x ^ (x + 1)");
    }

    #[test]
    fn test_display_calls_and_constants() {
        let expr = Expr::add(
            Expr::call(Function::Sin, x()),
            Expr::call(Function::Cos, Expr::constant(Constant::Pi)),
        );
        assert_eq!(expr.to_string(), "sin(x) + cos(pi)");
        assert_eq!(Expr::neg(Expr::add(x(), x())).to_string(), "-(x + x)");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(1.6), "1.6");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-6.02e23), "-6.02e+23");
        assert_eq!(format_number(1.5e-8), "1.5e-8");
    }

    #[test]
    fn test_contains_variable() {
        let expr = Expr::mul(Expr::number(2.0), Expr::call(Function::Sqrt, Expr::variable("y")));
        assert!(expr.contains_variable("y"));
        assert!(!expr.contains_variable("x"));
    }

    #[test]
    fn test_check_depth() {
        let mut expr = x();
        for _ in 0..9 {
            expr = Expr::neg(expr);
        }
        assert!(expr.check_depth(10).is_ok());
        assert_eq!(
            expr.check_depth(9),
            Err(MathError::DepthExceeded { limit: 9 })
        );
    }
}
