//! Per-call resource budget
//!
//! Every recursive tree walk that can be fed untrusted input charges one
//! step per visited node, so pathological input fails with an error instead
//! of exhausting the stack or spinning.

use crate::config::EngineConfig;
use crate::error::{MathError, MathResult};

#[derive(Debug, Clone)]
pub(crate) struct Budget {
    max_depth: usize,
    max_operations: usize,
    used: usize,
}

impl Budget {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_operations: config.max_operations,
            used: 0,
        }
    }

    /// Charge one node visit at the given recursion depth.
    pub(crate) fn step(&mut self, depth: usize) -> MathResult<()> {
        if depth > self.max_depth {
            return Err(MathError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.used += 1;
        if self.used > self.max_operations {
            return Err(MathError::OperationLimit {
                limit: self.max_operations,
            });
        }
        Ok(())
    }

    /// Charge visits without a depth (loops over already-built terms).
    pub(crate) fn charge(&mut self, count: usize) -> MathResult<()> {
        self.used += count;
        if self.used > self.max_operations {
            return Err(MathError::OperationLimit {
                limit: self.max_operations,
            });
        }
        Ok(())
    }

    /// A chain of `length` nested nodes must stay within the depth limit.
    pub(crate) fn check_chain(&self, length: usize) -> MathResult<()> {
        if length > self.max_depth {
            return Err(MathError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }
}
