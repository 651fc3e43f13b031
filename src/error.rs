//! Error types for the symcalc engine

use thiserror::Error;

/// Result type for engine operations
pub type MathResult<T> = Result<T, MathError>;

/// Engine errors
///
/// Inside expressions, division by zero and out-of-domain function calls are
/// not errors: they produce `Infinity` / `NaN` like any other IEEE float
/// computation. Only the two-number `calculate` operation rejects a zero divisor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MathError {
    #[error("Lexer error at position {position}: unexpected character '{character}'")]
    Lexer { position: usize, character: char },

    #[error("Syntax error at position {position}: expected {expected}, found {found}")]
    Syntax {
        position: usize,
        found: String,
        expected: String,
    },

    #[error("Unbound variable: {name}")]
    UnboundVariable { name: String },

    #[error("Shape mismatch: expected {expected}, got {got}")]
    Shape { expected: String, got: String },

    #[error("Singular matrix: pivot {pivot:e} in column {column} is numerically zero")]
    SingularMatrix { pivot: f64, column: usize },

    #[error("Expression exceeds the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error("Expression exceeds the operation budget of {limit}")]
    OperationLimit { limit: usize },

    #[error("Cannot divide by zero")]
    DivisionByZero,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl MathError {
    pub fn syntax(position: usize, found: impl Into<String>, expected: impl Into<String>) -> Self {
        MathError::Syntax {
            position,
            found: found.into(),
            expected: expected.into(),
        }
    }

    pub fn unbound(name: impl Into<String>) -> Self {
        MathError::UnboundVariable { name: name.into() }
    }

    pub fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
        MathError::Shape {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        MathError::Unsupported { message: msg.into() }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        MathError::NotImplemented {
            feature: feature.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        MathError::Config { message: msg.into() }
    }

    /// Stable name of the error family, as reported across the response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            MathError::Lexer { .. } | MathError::Syntax { .. } => "SyntaxError",
            MathError::UnboundVariable { .. } => "UnboundVariableError",
            MathError::Shape { .. } => "ShapeError",
            MathError::SingularMatrix { .. } => "SingularMatrixError",
            MathError::DepthExceeded { .. } | MathError::OperationLimit { .. } => {
                "DepthExceededError"
            }
            MathError::DivisionByZero => "DivisionByZeroError",
            MathError::Unsupported { .. } => "UnsupportedOperationError",
            MathError::NotImplemented { .. } => "NotImplementedError",
            MathError::Config { .. } => "ConfigError",
        }
    }
}
