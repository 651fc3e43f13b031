//! Numeric evaluation of expression trees
//!
//! Post-order: children are evaluated before their parent combines them.
//! Arithmetic follows IEEE semantics, so `1/0` is `Infinity` and
//! `sqrt(-1)` is `NaN`; neither is an error.

use log::debug;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::config::EngineConfig;
use crate::error::{MathError, MathResult};
use crate::limits::Budget;
use crate::matrix::{matrix_add, matrix_multiply};
use crate::value::{Scope, Value};

/// Evaluator for a single call
pub struct Evaluator<'a> {
    scope: &'a Scope,
    budget: Budget,
}

impl<'a> Evaluator<'a> {
    pub fn new(scope: &'a Scope, config: &EngineConfig) -> Self {
        Self {
            scope,
            budget: Budget::new(config),
        }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> MathResult<Value> {
        let value = self.eval(expr, 1)?;
        debug!("evaluated {} = {}", expr, value);
        Ok(value)
    }

    fn eval(&mut self, expr: &Expr, depth: usize) -> MathResult<Value> {
        self.budget.step(depth)?;

        match expr {
            Expr::Number(n) => Ok(Value::Scalar(*n)),

            Expr::Constant(c) => Ok(Value::Scalar(c.value())),

            Expr::Variable(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| MathError::unbound(name.as_str())),

            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Ok(self.eval(operand, depth + 1)?.map(|x| -x)),

            Expr::Binary { op, left, right } => {
                let left = self.eval(left, depth + 1)?;
                let right = self.eval(right, depth + 1)?;
                apply_binary(*op, &left, &right)
            }

            Expr::Call { function, args } => {
                let [arg] = args.as_slice() else {
                    return Err(MathError::unsupported(format!(
                        "{} expects 1 argument, got {}",
                        function,
                        args.len()
                    )));
                };
                let function = *function;
                Ok(self.eval(arg, depth + 1)?.map(|x| function.apply(x)))
            }
        }
    }
}

/// Combine two evaluated operands
pub(crate) fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> MathResult<Value> {
    match (op, left, right) {
        (_, Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(op.apply(*a, *b))),

        (BinaryOp::Add, _, _) => matrix_add(left, right),
        (BinaryOp::Sub, _, _) => matrix_add(left, &right.map(|x| -x)),
        (BinaryOp::Mul, _, _) => matrix_multiply(left, right),

        (BinaryOp::Div, Value::Matrix(m), Value::Scalar(s)) => {
            let s = *s;
            Ok(Value::Matrix(m.map(|x| x / s)))
        }

        (BinaryOp::Div, _, _) | (BinaryOp::Pow, _, _) => Err(MathError::unsupported(format!(
            "'{}' between {} and {}",
            op.symbol(),
            left.describe(),
            right.describe()
        ))),
    }
}

/// Evaluate a tree with the default limits
pub fn evaluate(expr: &Expr, scope: &Scope) -> MathResult<Value> {
    Evaluator::new(scope, &EngineConfig::default()).evaluate(expr)
}
