//! Rewriting into a single fraction
//!
//! The tree is first split into a numerator/denominator pair. Sums of
//! fractions use the product of the two denominators (equal denominators
//! are shared), which is always correct but not reduced to the least common
//! denominator. Both halves are then expanded into canonical sums and the
//! quotient is simplified.

use log::debug;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::config::EngineConfig;
use crate::error::MathResult;
use crate::limits::Budget;
use crate::simplify::{divide, Simplifier};

fn one() -> Expr {
    Expr::Number(1.0)
}

/// Multiply, dropping unit factors
fn times(a: Expr, b: Expr) -> Expr {
    if a.is_number(1.0) {
        b
    } else if b.is_number(1.0) {
        a
    } else {
        Expr::mul(a, b)
    }
}

fn raise(base: Expr, exponent: u32) -> Expr {
    if exponent == 1 || base.is_number(1.0) {
        base
    } else if exponent == 0 {
        one()
    } else {
        Expr::pow(base, Expr::Number(f64::from(exponent)))
    }
}

/// Integral exponent of `u ^ k`, if `k` is a literal integer
fn integer_exponent(exponent: &Expr) -> Option<i32> {
    let value = match exponent {
        Expr::Number(n) => *n,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => -operand.as_number()?,
        _ => return None,
    };
    let in_range = value.fract() == 0.0 && value.abs() <= f64::from(i32::MAX);
    in_range.then_some(value as i32)
}

/// Top-level addends of a canonical sum with their signs
fn addends(expr: &Expr) -> Vec<(bool, Expr)> {
    let mut out = Vec::new();
    let mut stack = vec![(true, expr)];
    while let Some((positive, node)) = stack.pop() {
        match node {
            Expr::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Sub),
                left,
                right,
            } => {
                stack.push((positive == (*op == BinaryOp::Add), &**right));
                stack.push((positive, &**left));
            }
            other => out.push((positive, other.clone())),
        }
    }
    out
}

/// `c * rest` for a canonical term
fn split_leading(term: &Expr) -> (f64, Expr) {
    match term {
        Expr::Number(n) => (*n, one()),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => {
            let (c, rest) = split_leading(operand);
            (-c, rest)
        }
        Expr::Binary {
            op: BinaryOp::Mul,
            left,
            right,
        } => {
            let (c, rest) = split_leading(left);
            (c, times(rest, (**right).clone()))
        }
        other => (1.0, other.clone()),
    }
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

struct Rationalizer<'b> {
    simplifier: Simplifier<'b>,
    max_expand_power: u32,
}

impl Rationalizer<'_> {
    /// Split `expr` into `(numerator, denominator)`
    fn fraction(&mut self, expr: &Expr, depth: usize) -> MathResult<(Expr, Expr)> {
        self.simplifier.step(depth)?;

        let pair = match expr {
            Expr::Number(_) | Expr::Constant(_) | Expr::Variable(_) | Expr::Call { .. } => {
                (expr.clone(), one())
            }

            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let (n, d) = self.fraction(operand, depth + 1)?;
                (Expr::neg(n), d)
            }

            Expr::Binary { op, left, right } => {
                match op {
                    BinaryOp::Add | BinaryOp::Sub => {
                        let (a, b) = self.fraction(left, depth + 1)?;
                        let (c, d) = self.fraction(right, depth + 1)?;
                        if b == d {
                            (Expr::binary(*op, a, c), b)
                        } else {
                            let numerator =
                                Expr::binary(*op, times(a, d.clone()), times(c, b.clone()));
                            (numerator, times(b, d))
                        }
                    }
                    BinaryOp::Mul => {
                        let (a, b) = self.fraction(left, depth + 1)?;
                        let (c, d) = self.fraction(right, depth + 1)?;
                        (times(a, c), times(b, d))
                    }
                    BinaryOp::Div => {
                        let (a, b) = self.fraction(left, depth + 1)?;
                        let (c, d) = self.fraction(right, depth + 1)?;
                        (times(a, d), times(b, c))
                    }
                    BinaryOp::Pow => match integer_exponent(right) {
                        Some(k) => {
                            let (n, d) = self.fraction(left, depth + 1)?;
                            let power = k.unsigned_abs();
                            if k >= 0 {
                                (raise(n, power), raise(d, power))
                            } else {
                                (raise(d, power), raise(n, power))
                            }
                        }
                        None => (expr.clone(), one()),
                    },
                }
            }
        };
        Ok(pair)
    }

    /// Expand products and small integer powers of sums into a canonical sum
    fn expand(&mut self, expr: &Expr, depth: usize) -> MathResult<Expr> {
        self.simplifier.step(depth)?;

        match expr {
            Expr::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Sub),
                left,
                right,
            } => {
                let left = self.expand(left, depth + 1)?;
                let right = self.expand(right, depth + 1)?;
                self.simplifier.sum(&Expr::binary(*op, left, right))
            }

            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let operand = self.expand(operand, depth + 1)?;
                self.simplifier.product(Expr::neg(operand))
            }

            Expr::Binary {
                op: BinaryOp::Mul,
                left,
                right,
            } => {
                let left = self.expand(left, depth + 1)?;
                let right = self.expand(right, depth + 1)?;
                self.distribute(&left, &right)
            }

            Expr::Binary {
                op: BinaryOp::Pow,
                left,
                right,
            } => {
                let base = self.expand(left, depth + 1)?;
                match integer_exponent(right) {
                    Some(k) if is_sum(&base) && k >= 2 && k.unsigned_abs() <= self.max_expand_power => {
                        let mut acc = base.clone();
                        for _ in 1..k {
                            acc = self.distribute(&acc, &base)?;
                        }
                        Ok(acc)
                    }
                    _ => self.simplifier.simplify(&Expr::pow(base, (**right).clone()), depth),
                }
            }

            _ => self.simplifier.simplify(expr, depth),
        }
    }

    /// Divide every coefficient of `numerator` by `divisor` when all divide exactly
    fn divide_coefficients(&mut self, numerator: &Expr, divisor: f64) -> MathResult<Option<Expr>> {
        let terms: Vec<(bool, f64, Expr)> = addends(numerator)
            .into_iter()
            .map(|(positive, term)| {
                let (c, rest) = split_leading(&term);
                (positive, c / divisor, rest)
            })
            .collect();
        if terms.is_empty() || terms.iter().any(|(_, c, _)| c.fract() != 0.0) {
            return Ok(None);
        }
        let parts = terms
            .into_iter()
            .map(|(positive, c, rest)| {
                let sign = if positive { 1.0 } else { -1.0 };
                (Expr::mul(Expr::Number(c), rest), sign)
            })
            .collect();
        self.simplifier.sum_of(parts).map(Some)
    }

    /// `(a1 + a2 + ...) * (b1 + b2 + ...)` as a canonical sum of products
    fn distribute(&mut self, a: &Expr, b: &Expr) -> MathResult<Expr> {
        if !is_sum(a) && !is_sum(b) {
            return self.simplifier.product(Expr::mul(a.clone(), b.clone()));
        }

        let left = addends(a);
        let right = addends(b);
        self.simplifier.charge(left.len() * right.len())?;

        let mut products = Vec::with_capacity(left.len() * right.len());
        for (sa, ta) in &left {
            for (sb, tb) in &right {
                let product = self.simplifier.product(Expr::mul(ta.clone(), tb.clone()))?;
                let sign = if sa == sb { 1.0 } else { -1.0 };
                products.push((product, sign));
            }
        }
        self.simplifier.sum_of(products)
    }
}

/// Rewrite `expr` as a single `numerator / denominator`
pub fn rationalize(expr: &Expr, config: &EngineConfig) -> MathResult<Expr> {
    let mut budget = Budget::new(config);
    let mut rationalizer = Rationalizer {
        simplifier: Simplifier::new(&mut budget),
        max_expand_power: config.max_expand_power,
    };

    let (numerator, denominator) = rationalizer.fraction(expr, 1)?;
    let numerator = rationalizer.expand(&numerator, 1)?;
    let denominator = rationalizer.expand(&denominator, 1)?;
    let result = match denominator.as_number() {
        Some(c) if c.is_finite() && c != 0.0 && c != 1.0 => {
            match rationalizer.divide_coefficients(&numerator, c)? {
                Some(reduced) => reduced,
                None => divide(numerator, denominator),
            }
        }
        _ => divide(numerator, denominator),
    };

    debug!("rationalized {} to {}", expr, result);
    Ok(result)
}
