//! Request and response envelopes

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request from the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen id echoed in the response
    pub id: u64,

    /// Operation name, e.g. `readFile`
    pub operation: String,

    /// Operation arguments; absent arguments decode as `null`
    #[serde(default)]
    pub args: Value,
}

impl Request {
    pub fn new(id: u64, operation: impl Into<String>, args: Value) -> Self {
        Self {
            id,
            operation: operation.into(),
            args,
        }
    }
}

/// A response to a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers
    pub id: u64,

    /// Whether the operation succeeded
    pub success: bool,

    /// Operation result (success only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message (failure only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a success response
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Create a failure response
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }
}
