//! Uniform result envelope for callers across a process boundary

use serde::Serialize;

use crate::error::{MathError, MathResult};

/// `{ "success": .., "message": .., "data": .. }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> Response<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failure envelope; the message starts with the error kind.
    pub fn failure(error: &MathError) -> Self {
        Self {
            success: false,
            message: format!("{}: {}", error.kind(), error),
            data: None,
        }
    }

    pub fn from_result(message: impl Into<String>, result: MathResult<T>) -> Self {
        match result {
            Ok(data) => Self::success(message, data),
            Err(e) => Self::failure(&e),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
