//! Symbolic and numeric math engine
//!
//! This library parses infix expressions into immutable trees and then
//! evaluates, differentiates, simplifies or rationalizes them. It also
//! provides dense matrix arithmetic and an LU-based linear system solver.
//!
//! # Example
//!
//! ```rust
//! use symcalc::{differentiate, evaluate, simplify, Scope};
//!
//! let scope = Scope::new().with("x", 2.0);
//! assert_eq!(evaluate("2 * (3 + x) - 1", &scope).unwrap().to_string(), "9");
//! assert_eq!(differentiate("x^2", "x").unwrap().to_string(), "2 * x");
//! assert_eq!(simplify("2*x + 3*x", &Scope::new()).unwrap().to_string(), "5 * x");
//! ```

pub mod ast;
pub mod calculate;
pub mod config;
pub mod derivative;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lexer;
mod limits;
pub mod linalg;
pub mod matrix;
pub mod parser;
pub mod rationalize;
pub mod response;
pub mod simplify;
pub mod value;

pub use ast::{BinaryOp, Constant, Expr, Function, UnaryOp};
pub use calculate::Operation;
pub use config::EngineConfig;
pub use engine::{Engine, Source};
pub use error::{MathError, MathResult};
pub use linalg::{EquationSystem, LuDecomposition, Solution};
pub use matrix::{Matrix, MatrixInput};
pub use parser::Parser;
pub use response::Response;
pub use simplify::Simplified;
pub use value::{Scope, Value};

/// Parse an expression with the default depth limit
pub fn parse(text: &str) -> MathResult<Expr> {
    Engine::default().parse(text)
}

/// Evaluate text or a tree against `scope`
pub fn evaluate<'a>(source: impl Into<Source<'a>>, scope: &Scope) -> MathResult<Value> {
    Engine::default().evaluate(source, scope)
}

/// Evaluate an expression that has no variables
pub fn calculate_expression<'a>(source: impl Into<Source<'a>>) -> MathResult<Value> {
    Engine::default().calculate_expression(source)
}

/// Two-number arithmetic; a zero divisor is a `DivisionByZero` error
pub fn calculate(op: Operation, a: f64, b: f64) -> MathResult<f64> {
    calculate::calculate(op, a, b)
}

/// Derivative with respect to `variable`, without simplification
pub fn differentiate<'a>(source: impl Into<Source<'a>>, variable: &str) -> MathResult<Expr> {
    Engine::default().differentiate(source, variable)
}

/// Canonical form, or the evaluated value when `scope` has bindings
pub fn simplify<'a>(source: impl Into<Source<'a>>, scope: &Scope) -> MathResult<Simplified> {
    Engine::default().simplify(source, scope)
}

pub fn rationalize<'a>(source: impl Into<Source<'a>>) -> MathResult<Expr> {
    Engine::default().rationalize(source)
}

pub fn create_matrix(input: MatrixInput) -> MathResult<Matrix> {
    matrix::create_matrix(input)
}

pub fn matrix_add(a: &Value, b: &Value) -> MathResult<Value> {
    matrix::matrix_add(a, b)
}

pub fn matrix_multiply(a: &Value, b: &Value) -> MathResult<Value> {
    matrix::matrix_multiply(a, b)
}

/// Solve `A x = b`; with names the solution is keyed by them
pub fn solve_linear_system(
    coefficients: &Matrix,
    constants: &[f64],
    names: Option<&[String]>,
) -> MathResult<Solution> {
    Engine::default().solve_linear_system(coefficients, constants, names)
}

pub fn solve_equation_system(system: &EquationSystem, names: Option<&[String]>) -> MathResult<Solution> {
    Engine::default().solve_equation_system(system, names)
}
