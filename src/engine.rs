//! The engine facade
//!
//! An [`Engine`] only holds its configuration. Every method is a pure
//! function of its inputs, so one engine can be shared across threads
//! without locking.

use std::borrow::Cow;

use crate::ast::Expr;
use crate::calculate::{self, Operation};
use crate::config::EngineConfig;
use crate::derivative::Differentiator;
use crate::error::MathResult;
use crate::evaluator::Evaluator;
use crate::linalg::{self, EquationSystem, Solution};
use crate::matrix::{self, Matrix, MatrixInput};
use crate::parser::Parser;
use crate::rationalize;
use crate::simplify::{self, Simplified};
use crate::value::{Scope, Value};

/// Expression input: source text, or an already parsed tree
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    Text(&'a str),
    Tree(&'a Expr),
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(text: &'a str) -> Self {
        Source::Text(text)
    }
}

impl<'a> From<&'a String> for Source<'a> {
    fn from(text: &'a String) -> Self {
        Source::Text(text)
    }
}

impl<'a> From<&'a Expr> for Source<'a> {
    fn from(expr: &'a Expr) -> Self {
        Source::Tree(expr)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse text, or depth-check a tree supplied by the caller
    fn resolve<'a>(&self, source: Source<'a>) -> MathResult<Cow<'a, Expr>> {
        match source {
            Source::Text(text) => {
                let mut parser = Parser::with_max_depth(text, self.config.max_depth)?;
                Ok(Cow::Owned(parser.parse_expression()?))
            }
            Source::Tree(expr) => {
                expr.check_depth(self.config.max_depth)?;
                Ok(Cow::Borrowed(expr))
            }
        }
    }

    pub fn parse(&self, text: &str) -> MathResult<Expr> {
        Parser::with_max_depth(text, self.config.max_depth)?.parse_expression()
    }

    pub fn evaluate<'a>(&self, source: impl Into<Source<'a>>, scope: &Scope) -> MathResult<Value> {
        let expr = self.resolve(source.into())?;
        Evaluator::new(scope, &self.config).evaluate(&expr)
    }

    /// Evaluate with no bindings; the plain-expression calculator
    pub fn calculate_expression<'a>(&self, source: impl Into<Source<'a>>) -> MathResult<Value> {
        self.evaluate(source, &Scope::new())
    }

    pub fn calculate(&self, op: Operation, a: f64, b: f64) -> MathResult<f64> {
        calculate::calculate(op, a, b)
    }

    pub fn differentiate<'a>(&self, source: impl Into<Source<'a>>, variable: &str) -> MathResult<Expr> {
        let expr = self.resolve(source.into())?;
        Differentiator::new(variable, &self.config).differentiate(&expr)
    }

    /// Canonical tree when `scope` is empty, evaluated value otherwise
    pub fn simplify<'a>(&self, source: impl Into<Source<'a>>, scope: &Scope) -> MathResult<Simplified> {
        let expr = self.resolve(source.into())?;
        simplify::simplify(&expr, scope, &self.config)
    }

    pub fn rationalize<'a>(&self, source: impl Into<Source<'a>>) -> MathResult<Expr> {
        let expr = self.resolve(source.into())?;
        rationalize::rationalize(&expr, &self.config)
    }

    pub fn create_matrix(&self, input: MatrixInput) -> MathResult<Matrix> {
        matrix::create_matrix(input)
    }

    pub fn matrix_add(&self, a: &Value, b: &Value) -> MathResult<Value> {
        matrix::matrix_add(a, b)
    }

    pub fn matrix_multiply(&self, a: &Value, b: &Value) -> MathResult<Value> {
        matrix::matrix_multiply(a, b)
    }

    pub fn solve_linear_system(
        &self,
        coefficients: &Matrix,
        constants: &[f64],
        names: Option<&[String]>,
    ) -> MathResult<Solution> {
        let values = linalg::solve_linear_system(coefficients, constants, &self.config)?;
        Solution::from_values(values, names)
    }

    pub fn solve_equation_system(
        &self,
        system: &EquationSystem,
        names: Option<&[String]>,
    ) -> MathResult<Solution> {
        linalg::solve_equation_system(system, names, &self.config)
    }
}
