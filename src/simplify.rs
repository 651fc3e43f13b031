//! Simplification
//!
//! Two distinct operations share the name. With a non-empty scope the
//! expression is evaluated against it ([`simplify_with_scope`]). Without one
//! the tree is rewritten into canonical form ([`simplify_symbolic`]):
//!
//! * sums become a list of `coefficient * monomial` terms with like terms
//!   merged, zero terms dropped, numbers first and the rest ordered by
//!   (rank, rendered text);
//! * products become a numeric coefficient and a list of factors, equal
//!   bases merge their exponents (`x * x` is `x ^ 2`);
//! * numeric subtrees fold when the result is finite.
//!
//! The canonical form is a fixed point, so simplifying twice gives the same
//! tree as simplifying once.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::config::EngineConfig;
use crate::error::MathResult;
use crate::evaluator::Evaluator;
use crate::limits::Budget;
use crate::value::{Scope, Value};

/// Outcome of [`simplify`]: a canonical tree, or a value when a scope was given
#[derive(Debug, Clone, PartialEq)]
pub enum Simplified {
    Expr(Expr),
    Value(Value),
}

impl Simplified {
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Simplified::Expr(expr) => Some(expr),
            Simplified::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Simplified::Value(value) => Some(value),
            Simplified::Expr(_) => None,
        }
    }
}

impl fmt::Display for Simplified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Simplified::Expr(expr) => write!(f, "{}", expr),
            Simplified::Value(value) => write!(f, "{}", value),
        }
    }
}

/// `coefficient * factors[0] * factors[1] * ...`
#[derive(Debug, Clone)]
struct Term {
    coefficient: f64,
    factors: Vec<Expr>,
}

/// Sort key: numbers, then constants, then everything else
fn rank(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(_) => 0,
        Expr::Constant(_) => 1,
        _ => 2,
    }
}

fn compare_factors(a: &[Expr], b: &[Expr]) -> Ordering {
    match (a.first(), b.first()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(_), Some(_)) => {
            let key = |factors: &[Expr]| {
                let head = factors.first().map(rank).unwrap_or(0);
                (head, build_product(1.0, factors).to_string())
            };
            key(a).cmp(&key(b))
        }
    }
}

fn compare_exprs(a: &Expr, b: &Expr) -> Ordering {
    (rank(a), a.to_string()).cmp(&(rank(b), b.to_string()))
}

fn is_sum(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Add | BinaryOp::Sub,
            ..
        }
    )
}

/// Left-associated product with the coefficient in front
fn build_product(coefficient: f64, factors: &[Expr]) -> Expr {
    let mut iter = factors.iter().cloned();
    let Some(first) = iter.next() else {
        return Expr::Number(coefficient);
    };
    if coefficient == 0.0 {
        return Expr::Number(0.0);
    }

    let (mut acc, negate) = if coefficient == 1.0 {
        (first, false)
    } else if coefficient == -1.0 {
        (first, true)
    } else {
        (Expr::mul(Expr::Number(coefficient), first), false)
    };
    for factor in iter {
        acc = Expr::mul(acc, factor);
    }
    if negate {
        Expr::neg(acc)
    } else {
        acc
    }
}

/// Split a canonical product into its numeric coefficient and factors
fn split_product(expr: &Expr) -> (f64, Vec<Expr>) {
    let mut coefficient = 1.0;
    let mut factors = Vec::new();
    let mut stack = vec![expr];
    while let Some(node) = stack.pop() {
        match node {
            Expr::Number(n) => coefficient *= n,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                coefficient = -coefficient;
                stack.push(operand);
            }
            Expr::Binary {
                op: BinaryOp::Mul,
                left,
                right,
            } => {
                stack.push(right);
                stack.push(left);
            }
            other => factors.push(other.clone()),
        }
    }
    (coefficient, factors)
}

/// `x ^ 3` is base `x` with exponent `3`; anything else has exponent `1`
fn base_and_exponent(factor: Expr) -> (Expr, f64) {
    if let Expr::Binary {
        op: BinaryOp::Pow,
        left,
        right,
    } = &factor
    {
        if let Some(n) = right.as_number() {
            return ((**left).clone(), n);
        }
    }
    (factor, 1.0)
}

fn fold(op: BinaryOp, a: f64, b: f64) -> Option<Expr> {
    let value = op.apply(a, b);
    value.is_finite().then_some(Expr::Number(value))
}

/// Canonicalizer sharing a budget with its caller
pub(crate) struct Simplifier<'b> {
    budget: &'b mut Budget,
}

impl<'b> Simplifier<'b> {
    pub(crate) fn new(budget: &'b mut Budget) -> Self {
        Self { budget }
    }

    pub(crate) fn step(&mut self, depth: usize) -> MathResult<()> {
        self.budget.step(depth)
    }

    pub(crate) fn charge(&mut self, count: usize) -> MathResult<()> {
        self.budget.charge(count)
    }

    pub(crate) fn simplify(&mut self, expr: &Expr, depth: usize) -> MathResult<Expr> {
        self.budget.step(depth)?;

        let result = match expr {
            Expr::Number(_) | Expr::Constant(_) | Expr::Variable(_) => expr.clone(),

            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let operand = self.simplify(operand, depth + 1)?;
                self.product(Expr::neg(operand))?
            }

            Expr::Binary { op, left, right } => {
                let left = self.simplify(left, depth + 1)?;
                let right = self.simplify(right, depth + 1)?;
                match op {
                    BinaryOp::Add | BinaryOp::Sub => self.sum(&Expr::binary(*op, left, right))?,
                    BinaryOp::Mul => self.product(Expr::mul(left, right))?,
                    BinaryOp::Div => divide(left, right),
                    BinaryOp::Pow => power(left, right),
                }
            }

            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.simplify(arg, depth + 1).map(Arc::new))
                    .collect::<MathResult<Vec<_>>>()?;
                let folded = match args.as_slice() {
                    [arg] => arg
                        .as_number()
                        .map(|n| function.apply(n))
                        .filter(|value| value.is_finite()),
                    _ => None,
                };
                match folded {
                    Some(value) => Expr::Number(value),
                    None => Expr::Call {
                        function: *function,
                        args,
                    },
                }
            }
        };

        if &result != expr {
            trace!("simplified {} -> {}", expr, result);
        }
        Ok(result)
    }

    /// Canonical sum of already simplified operands
    pub(crate) fn sum(&mut self, expr: &Expr) -> MathResult<Expr> {
        self.sum_of(vec![(expr.clone(), 1.0)])
    }

    /// Canonical sum of `scale * addend` pairs
    pub(crate) fn sum_of(&mut self, mut stack: Vec<(Expr, f64)>) -> MathResult<Expr> {
        let mut terms: Vec<Term> = Vec::new();
        stack.reverse();

        loop {
            while let Some((node, scale)) = stack.pop() {
                self.budget.charge(1)?;
                match node {
                    Expr::Binary {
                        op: op @ (BinaryOp::Add | BinaryOp::Sub),
                        left,
                        right,
                    } => {
                        let sign = if op == BinaryOp::Sub { -1.0 } else { 1.0 };
                        stack.push(((*right).clone(), scale * sign));
                        stack.push(((*left).clone(), scale));
                    }
                    node => {
                        let (coefficient, factors) = split_product(&node);
                        match factors.as_slice() {
                            // c * (a + b) distributes
                            [single] if is_sum(single) => {
                                stack.push((single.clone(), scale * coefficient));
                            }
                            _ => merge_term(&mut terms, scale * coefficient, factors),
                        }
                    }
                }
            }

            terms.retain(|term| term.coefficient != 0.0);

            // merged coefficients go back through `product` until none scale a sum factor
            let (scaled, kept): (Vec<Term>, Vec<Term>) = terms
                .into_iter()
                .partition(|term| scales_a_sum(term.coefficient, &term.factors));
            terms = kept;
            if scaled.is_empty() {
                break;
            }
            for term in scaled {
                let product = self.product(build_product(term.coefficient, &term.factors))?;
                stack.push((product, 1.0));
            }
        }

        self.budget.check_chain(terms.len())?;
        terms.sort_by(|a, b| compare_factors(&a.factors, &b.factors));

        let mut iter = terms.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Expr::Number(0.0));
        };
        let mut acc = build_product(first.coefficient, &first.factors);
        for term in iter {
            acc = if term.coefficient < 0.0 {
                Expr::sub(acc, build_product(-term.coefficient, &term.factors))
            } else {
                Expr::add(acc, build_product(term.coefficient, &term.factors))
            };
        }
        Ok(acc)
    }

    /// Canonical product of already simplified operands
    pub(crate) fn product(&mut self, expr: Expr) -> MathResult<Expr> {
        let (mut coefficient, raw) = split_product(&expr);
        self.budget.charge(raw.len())?;
        if coefficient == 0.0 {
            return Ok(Expr::Number(0.0));
        }

        let mut factors = group_factors(raw);
        if scales_a_sum(coefficient, &factors) {
            if let Some(index) = factors.iter().position(is_sum) {
                let scaled = Expr::mul(Expr::Number(coefficient), factors[index].clone());
                factors[index] = self.sum(&scaled)?;
                coefficient = 1.0;
                factors = group_factors(factors);
            }
        }
        self.budget.check_chain(factors.len() + 1)?;

        match factors.as_slice() {
            [single] if is_sum(single) => {
                let scaled = build_product(coefficient, &factors);
                self.sum(&scaled)
            }
            _ => Ok(build_product(coefficient, &factors)),
        }
    }
}

/// A coefficient other than 1 next to a sum factor is pushed into that sum
fn scales_a_sum(coefficient: f64, factors: &[Expr]) -> bool {
    coefficient != 1.0 && factors.len() > 1 && factors.iter().any(is_sum)
}

/// Merge equal bases by adding exponents, drop `^0`, and sort
fn group_factors(raw: Vec<Expr>) -> Vec<Expr> {
    let mut grouped: Vec<(Expr, f64)> = Vec::new();
    for factor in raw {
        let (base, exponent) = base_and_exponent(factor);
        match grouped.iter_mut().find(|(b, _)| *b == base) {
            Some((_, total)) => *total += exponent,
            None => grouped.push((base, exponent)),
        }
    }

    let mut factors: Vec<Expr> = grouped
        .into_iter()
        .filter(|(_, exponent)| *exponent != 0.0)
        .map(|(base, exponent)| {
            if exponent == 1.0 {
                base
            } else {
                Expr::pow(base, Expr::Number(exponent))
            }
        })
        .collect();
    factors.sort_by(compare_exprs);
    factors
}

fn merge_term(terms: &mut Vec<Term>, coefficient: f64, factors: Vec<Expr>) {
    match terms.iter_mut().find(|term| term.factors == factors) {
        Some(term) => term.coefficient += coefficient,
        None => terms.push(Term {
            coefficient,
            factors,
        }),
    }
}

pub(crate) fn divide(left: Expr, right: Expr) -> Expr {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        if let Some(folded) = fold(BinaryOp::Div, a, b) {
            return folded;
        }
    }
    if right.is_number(1.0) {
        return left;
    }
    if left.is_number(0.0) && !right.is_number(0.0) {
        return Expr::Number(0.0);
    }
    if left == right && left.as_number().is_none() {
        return Expr::Number(1.0);
    }
    Expr::div(left, right)
}

fn power(left: Expr, right: Expr) -> Expr {
    if right.is_number(0.0) || left.is_number(1.0) {
        return Expr::Number(1.0);
    }
    if right.is_number(1.0) {
        return left;
    }
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        if let Some(folded) = fold(BinaryOp::Pow, a, b) {
            return folded;
        }
    }
    Expr::pow(left, right)
}

/// Rewrite `expr` into canonical form
pub fn simplify_symbolic(expr: &Expr, config: &EngineConfig) -> MathResult<Expr> {
    let mut budget = Budget::new(config);
    let result = Simplifier::new(&mut budget).simplify(expr, 1)?;
    debug!("simplified {} to {} ({} steps)", expr, result, budget.used());
    Ok(result)
}

/// Evaluate `expr` against `scope`; the result is a number, not a tree
pub fn simplify_with_scope(expr: &Expr, scope: &Scope, config: &EngineConfig) -> MathResult<Value> {
    Evaluator::new(scope, config).evaluate(expr)
}

/// Evaluate when `scope` has bindings, canonicalize otherwise
pub fn simplify(expr: &Expr, scope: &Scope, config: &EngineConfig) -> MathResult<Simplified> {
    if scope.is_empty() {
        simplify_symbolic(expr, config).map(Simplified::Expr)
    } else {
        simplify_with_scope(expr, scope, config).map(Simplified::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::differentiate;
    use crate::error::MathError;
    use crate::parser::parse;

    fn simp(source: &str) -> String {
        simplify_symbolic(&parse(source).unwrap(), &EngineConfig::default())
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_like_terms() {
        assert_eq!(simp("2*x + 3*x"), "5 * x");
        assert_eq!(simp("x + x"), "2 * x");
        assert_eq!(simp("x - x"), "0");
        assert_eq!(simp("3*x + 2*y - x + 1"), "1 + 2 * x + 2 * y");
        assert_eq!(simp("x * y + y * x"), "2 * x * y");
    }

    #[test]
    fn test_identities() {
        assert_eq!(simp("x + 0"), "x");
        assert_eq!(simp("x * 1"), "x");
        assert_eq!(simp("x * 0"), "0");
        assert_eq!(simp("x ^ 1"), "x");
        assert_eq!(simp("x ^ 0"), "1");
        assert_eq!(simp("1 ^ x"), "1");
        assert_eq!(simp("x / 1"), "x");
        assert_eq!(simp("0 / x"), "0");
        assert_eq!(simp("sin(x) / sin(x)"), "1");
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(simp("2 + 3 * 4"), "14");
        assert_eq!(simp("2 ^ 10"), "1024");
        assert_eq!(simp("sqrt(16) + x"), "4 + x");
        assert_eq!(simp("1 / 2"), "0.5");
        // non-finite results are left alone
        assert_eq!(simp("1 / 0"), "1 / 0");
    }

    #[test]
    fn test_products() {
        assert_eq!(simp("x * x"), "x ^ 2");
        assert_eq!(simp("x ^ 2 * x"), "x ^ 3");
        assert_eq!(simp("y * 2 * x"), "2 * x * y");
        assert_eq!(simp("-x * -y"), "x * y");
        assert_eq!(simp("-(2 * x)"), "-2 * x");
        assert_eq!(simp("x * pi"), "pi * x");
    }

    #[test]
    fn test_distributes_numeric_coefficients() {
        assert_eq!(simp("2 * (x + 1)"), "2 + 2 * x");
        assert_eq!(simp("-(x - 1)"), "1 - x");
        assert_eq!(simp("x - (x + 1)"), "-1");
        assert_eq!(simp("2 * y * (x + 1)"), "(2 + 2 * x) * y");
        assert_eq!(simp("y * (x + 1) + y * (x + 1)"), "(2 + 2 * x) * y");
    }

    #[test]
    fn test_idempotent() {
        let sources = [
            "2*x + 3*x",
            "x^3 + 2*x^2 + x + 1",
            "3*x + 2*y - x + 1",
            "-(x - 1) * y",
            "sin(x)^2 + cos(x)^2",
            "(x + 1) * (x - 1)",
            "x / (y + y) - 2",
            "-x + y * -3",
            "e ^ x * log(2) * 2",
            "1 / 0 + x",
            "2*y*(x+1)",
            "y*(x+1) + (x+1)*y",
            "-(x+1)*(y+1)*3",
        ];
        let config = EngineConfig::default();
        for source in sources {
            let once = simplify_symbolic(&parse(source).unwrap(), &config).unwrap();
            let twice = simplify_symbolic(&once, &config).unwrap();
            assert_eq!(once, twice, "{}", source);
        }
    }

    #[test]
    fn test_simplifies_derivatives() {
        let derivative = differentiate(&parse("x^2 * x").unwrap(), "x").unwrap();
        let simplified = simplify_symbolic(&derivative, &EngineConfig::default()).unwrap();
        assert_eq!(simplified.to_string(), "3 * x ^ 2");
    }

    #[test]
    fn test_scope_evaluates() {
        let expr = parse("x + 1").unwrap();
        let scope = Scope::new().with("x", 2.0);
        let result = simplify(&expr, &scope, &EngineConfig::default()).unwrap();
        assert_eq!(result, Simplified::Value(Value::Scalar(3.0)));
        assert_eq!(result.to_string(), "3");

        let result = simplify(&expr, &Scope::new(), &EngineConfig::default()).unwrap();
        assert_eq!(result.to_string(), "1 + x");
    }

    #[test]
    fn test_scope_reports_unbound_names() {
        let expr = parse("x + y").unwrap();
        let scope = Scope::new().with("x", 2.0);
        let err = simplify(&expr, &scope, &EngineConfig::default()).unwrap_err();
        assert_eq!(err, MathError::unbound("y"));
    }

    #[test]
    fn test_operation_budget() {
        let expr = parse("x + x + x + x + x").unwrap();
        let config = EngineConfig::default().with_max_operations(5);
        let err = simplify_symbolic(&expr, &config).unwrap_err();
        assert_eq!(err.kind(), "DepthExceededError");
    }
}
