//! Symbolic differentiation
//!
//! A structural rewrite with the usual rules (constant, sum, product,
//! quotient, power, exponential and chain rule). The result is built with
//! the folding constructors below, which only remove identities that appear
//! locally while building (`u * 1`, `u + 0`, `u ^ 1`, numeric operands,
//! `log(e)`). Terms are never reordered or collected; that is left to the
//! simplifier.

use std::sync::Arc;

use log::debug;

use crate::ast::{BinaryOp, Constant, Expr, Function, UnaryOp};
use crate::config::EngineConfig;
use crate::error::{MathError, MathResult};
use crate::limits::Budget;

fn number(value: f64) -> Expr {
    Expr::Number(value)
}

/// Fold a numeric result, or build the node when the result is not finite
fn fold_numbers(op: BinaryOp, a: f64, b: f64) -> Option<Expr> {
    let value = op.apply(a, b);
    value.is_finite().then(|| number(value))
}

fn neg(a: Expr) -> Expr {
    match a {
        Expr::Number(n) => number(-n),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Arc::unwrap_or_clone(operand),
        other => Expr::neg(other),
    }
}

fn add(a: Expr, b: Expr) -> Expr {
    if a.is_number(0.0) {
        return b;
    }
    if b.is_number(0.0) {
        return a;
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let Some(folded) = fold_numbers(BinaryOp::Add, x, y) {
            return folded;
        }
    }
    match b {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Expr::sub(a, operand),
        b => Expr::add(a, b),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    if b.is_number(0.0) {
        return a;
    }
    if a.is_number(0.0) {
        return neg(b);
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let Some(folded) = fold_numbers(BinaryOp::Sub, x, y) {
            return folded;
        }
    }
    match b {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Expr::add(a, operand),
        b => Expr::sub(a, b),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    if a.is_number(0.0) || b.is_number(0.0) {
        return number(0.0);
    }
    if a.is_number(1.0) {
        return b;
    }
    if b.is_number(1.0) {
        return a;
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let Some(folded) = fold_numbers(BinaryOp::Mul, x, y) {
            return folded;
        }
    }
    if a.is_number(-1.0) {
        return neg(b);
    }
    if b.is_number(-1.0) {
        return neg(a);
    }

    // (1 / d) * b  ->  b / d
    if let Expr::Binary {
        op: BinaryOp::Div,
        left,
        right,
    } = &a
    {
        if left.is_number(1.0) {
            return div(b, (**right).clone());
        }
    }
    if let Expr::Binary {
        op: BinaryOp::Div,
        left,
        right,
    } = &b
    {
        if left.is_number(1.0) {
            return div(a, (**right).clone());
        }
    }

    match (a, b) {
        // c1 * (c2 * rest)  ->  (c1 * c2) * rest
        (
            Expr::Number(c1),
            Expr::Binary {
                op: BinaryOp::Mul,
                left,
                right,
            },
        ) if left.as_number().is_some() => {
            let c2 = left.as_number().unwrap_or(1.0);
            mul(number(c1 * c2), Arc::unwrap_or_clone(right))
        }
        // numeric factors lead
        (a, Expr::Number(c)) if a.as_number().is_none() => mul(number(c), a),
        (a, b) => Expr::mul(a, b),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    if b.is_number(1.0) {
        return a;
    }
    if a.is_number(0.0) && !b.is_number(0.0) {
        return number(0.0);
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let Some(folded) = fold_numbers(BinaryOp::Div, x, y) {
            return folded;
        }
    }
    Expr::div(a, b)
}

fn pow(a: Expr, b: Expr) -> Expr {
    if b.is_number(0.0) {
        return number(1.0);
    }
    if b.is_number(1.0) {
        return a;
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let Some(folded) = fold_numbers(BinaryOp::Pow, x, y) {
            return folded;
        }
    }
    Expr::pow(a, b)
}

fn ln(a: Expr) -> Expr {
    match a {
        Expr::Constant(Constant::E) => number(1.0),
        a => Expr::call(Function::Log, a),
    }
}

/// Differentiates with respect to one variable
pub struct Differentiator<'a> {
    variable: &'a str,
    max_depth: usize,
    budget: Budget,
}

impl<'a> Differentiator<'a> {
    pub fn new(variable: &'a str, config: &EngineConfig) -> Self {
        Self {
            variable,
            max_depth: config.max_depth,
            budget: Budget::new(config),
        }
    }

    pub fn differentiate(&mut self, expr: &Expr) -> MathResult<Expr> {
        // the variable scan below recurses, so reject deep trees up front
        expr.check_depth(self.max_depth)?;
        let result = self.derive(expr, 1)?;
        debug!("d/d{} [{}] = {}", self.variable, expr, result);
        Ok(result)
    }

    fn derive(&mut self, expr: &Expr, depth: usize) -> MathResult<Expr> {
        self.budget.step(depth)?;

        // Constant rule
        if !expr.contains_variable(self.variable) {
            return Ok(number(0.0));
        }

        match expr {
            Expr::Number(_) | Expr::Constant(_) => Ok(number(0.0)),

            Expr::Variable(name) => Ok(number(if name == self.variable { 1.0 } else { 0.0 })),

            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Ok(neg(self.derive(operand, depth + 1)?)),

            Expr::Binary { op, left, right } => self.derive_binary(expr, *op, left, right, depth + 1),

            Expr::Call { function, args } => {
                let [arg] = args.as_slice() else {
                    return Err(MathError::unsupported(format!(
                        "derivative of {} with {} arguments",
                        function,
                        args.len()
                    )));
                };
                let inner = self.derive(arg, depth + 1)?;
                let arg = (**arg).clone();
                let outer = match function {
                    Function::Sin => Expr::call(Function::Cos, arg),
                    Function::Cos => neg(Expr::call(Function::Sin, arg)),
                    Function::Tan => div(number(1.0), pow(Expr::call(Function::Cos, arg), number(2.0))),
                    Function::Sqrt => div(number(1.0), mul(number(2.0), Expr::call(Function::Sqrt, arg))),
                    Function::Log => div(number(1.0), arg),
                };
                Ok(mul(outer, inner))
            }
        }
    }

    fn derive_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        depth: usize,
    ) -> MathResult<Expr> {
        let left_varies = left.contains_variable(self.variable);
        let right_varies = right.contains_variable(self.variable);

        let result = match op {
            BinaryOp::Add => add(self.derive(left, depth)?, self.derive(right, depth)?),

            BinaryOp::Sub => sub(self.derive(left, depth)?, self.derive(right, depth)?),

            BinaryOp::Mul => {
                if !left_varies {
                    mul(left.clone(), self.derive(right, depth)?)
                } else if !right_varies {
                    mul(self.derive(left, depth)?, right.clone())
                } else {
                    // Product rule
                    add(
                        mul(self.derive(left, depth)?, right.clone()),
                        mul(left.clone(), self.derive(right, depth)?),
                    )
                }
            }

            BinaryOp::Div => {
                if !right_varies {
                    div(self.derive(left, depth)?, right.clone())
                } else {
                    // Quotient rule
                    let numerator = sub(
                        mul(self.derive(left, depth)?, right.clone()),
                        mul(left.clone(), self.derive(right, depth)?),
                    );
                    div(numerator, pow(right.clone(), number(2.0)))
                }
            }

            BinaryOp::Pow => {
                if !right_varies {
                    // Power rule: n * u^(n-1) * u'
                    let reduced = pow(left.clone(), sub(right.clone(), number(1.0)));
                    mul(mul(right.clone(), reduced), self.derive(left, depth)?)
                } else if !left_varies {
                    // Exponential rule: a^v * ln(a) * v'
                    mul(mul(expr.clone(), ln(left.clone())), self.derive(right, depth)?)
                } else {
                    // u^v * (v' * ln(u) + v * u' / u)
                    let inner = add(
                        mul(self.derive(right, depth)?, ln(left.clone())),
                        div(mul(right.clone(), self.derive(left, depth)?), left.clone()),
                    );
                    mul(expr.clone(), inner)
                }
            }
        };

        Ok(result)
    }
}

/// Differentiate `expr` with respect to `variable` under the default limits
pub fn differentiate(expr: &Expr, variable: &str) -> MathResult<Expr> {
    Differentiator::new(variable, &EngineConfig::default()).differentiate(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::parser::parse;
    use crate::value::Scope;

    fn derive(source: &str) -> String {
        differentiate(&parse(source).unwrap(), "x").unwrap().to_string()
    }

    #[test]
    fn test_polynomials() {
        assert_eq!(derive("x^2"), "2 * x");
        assert_eq!(derive("x^3 + 2*x^2 + x + 1"), "3 * x ^ 2 + 4 * x + 1");
        assert_eq!(derive("5"), "0");
        assert_eq!(derive("y^2"), "0");
        assert_eq!(derive("x"), "1");
        assert_eq!(derive("x * 3"), "3");
    }

    #[test]
    fn test_functions() {
        assert_eq!(derive("sin(x)"), "cos(x)");
        assert_eq!(derive("cos(x)"), "-sin(x)");
        assert_eq!(derive("tan(x)"), "1 / cos(x) ^ 2");
        assert_eq!(derive("sqrt(x)"), "1 / (2 * sqrt(x))");
        assert_eq!(derive("log(x)"), "1 / x");
        assert_eq!(derive("sin(3 * x)"), "3 * cos(3 * x)");
    }

    #[test]
    fn test_exponentials() {
        assert_eq!(derive("e^x"), "e ^ x");
        assert_eq!(derive("2^x"), "2 ^ x * log(2)");
    }

    #[test]
    fn test_quotient_rule() {
        assert_eq!(derive("1 / x"), "-1 / x ^ 2");
        assert_eq!(derive("x / 2"), "0.5");
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let sources = ["x^x", "sin(x) * cos(x)", "log(x) / x", "sqrt(x^2 + 1)", "tan(2*x) - x^-2"];
        let h = 1e-6;
        for source in sources {
            let expr = parse(source).unwrap();
            let derivative = differentiate(&expr, "x").unwrap();
            let at = |e: &Expr, x: f64| {
                evaluate(e, &Scope::new().with("x", x)).unwrap().as_scalar().unwrap()
            };
            let x0 = 0.7;
            let numeric = (at(&expr, x0 + h) - at(&expr, x0 - h)) / (2.0 * h);
            let symbolic = at(&derivative, x0);
            assert!(
                (numeric - symbolic).abs() < 1e-5,
                "{}: {} vs {}",
                source,
                numeric,
                symbolic
            );
        }
    }

    #[test]
    fn test_multi_argument_call_is_unsupported() {
        let expr = Expr::Call {
            function: Function::Sin,
            args: vec![Arc::new(Expr::variable("x")), Arc::new(Expr::variable("y"))],
        };
        let err = differentiate(&expr, "x").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
    }

    #[test]
    fn test_deep_trees_are_rejected() {
        let mut expr = Expr::variable("x");
        for _ in 0..200_000 {
            expr = Expr::neg(expr);
        }
        let err = differentiate(&expr, "x").unwrap_err();
        assert_eq!(err.kind(), "DepthExceededError");
        // unwind without recursing through 200k drops
        while let Expr::Unary { operand, .. } = expr {
            expr = Arc::unwrap_or_clone(operand);
        }
    }

    #[test]
    fn test_operation_budget() {
        let expr = parse("x * x * x * x * x * x").unwrap();
        let config = EngineConfig::default().with_max_operations(5);
        let err = Differentiator::new("x", &config).differentiate(&expr).unwrap_err();
        assert_eq!(err.kind(), "DepthExceededError");
    }
}
