//! Two-operand arithmetic
//!
//! The plain calculator: one operation applied to two numbers. Unlike the
//! expression evaluator, a zero divisor is reported as an error.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{MathError, MathResult};

/// Operation accepted by [`calculate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = MathError;

    fn from_str(s: &str) -> MathResult<Self> {
        match s {
            "add" => Ok(Operation::Add),
            "subtract" => Ok(Operation::Subtract),
            "multiply" => Ok(Operation::Multiply),
            "divide" => Ok(Operation::Divide),
            other => Err(MathError::unsupported(format!(
                "unknown operation '{}' (expected add, subtract, multiply or divide)",
                other
            ))),
        }
    }
}

/// Apply `op` to `a` and `b`
pub fn calculate(op: Operation, a: f64, b: f64) -> MathResult<f64> {
    let result = match op {
        Operation::Add => a + b,
        Operation::Subtract => a - b,
        Operation::Multiply => a * b,
        Operation::Divide => {
            if b == 0.0 {
                return Err(MathError::DivisionByZero);
            }
            a / b
        }
    };
    debug!("{} {} {} = {}", op, a, b, result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations() {
        assert_eq!(calculate(Operation::Add, 5.0, 4.0), Ok(9.0));
        assert_eq!(calculate(Operation::Subtract, 5.0, 4.0), Ok(1.0));
        assert_eq!(calculate(Operation::Multiply, 5.0, 4.0), Ok(20.0));
        assert_eq!(calculate(Operation::Divide, 5.0, 4.0), Ok(1.25));
    }

    #[test]
    fn test_zero_divisor() {
        let err = calculate(Operation::Divide, 1.0, 0.0).unwrap_err();
        assert_eq!(err, MathError::DivisionByZero);
        assert_eq!(err.kind(), "DivisionByZeroError");
        assert_eq!(err.to_string(), "Cannot divide by zero");
        assert_eq!(calculate(Operation::Divide, 1.0, -0.0), Err(MathError::DivisionByZero));
        assert_eq!(calculate(Operation::Multiply, 3.0, 0.0), Ok(0.0));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!("multiply".parse::<Operation>(), Ok(Operation::Multiply));
        assert_eq!("power".parse::<Operation>().unwrap_err().kind(), "UnsupportedOperationError");
        let op: Operation = serde_json::from_str("\"divide\"").unwrap();
        assert_eq!(op, Operation::Divide);
        assert_eq!(op.to_string(), "divide");
    }
}
