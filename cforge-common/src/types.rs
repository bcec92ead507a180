//! JSON shapes exchanged with the compile endpoint

use serde::{Deserialize, Serialize};

/// Inbound body of `POST /compile`
///
/// `code` is optional on the wire so that a missing field and an empty
/// string are both reported as "No code provided" rather than as a
/// deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileRequestBody {
    #[serde(default)]
    pub code: Option<String>,
}

impl CompileRequestBody {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }
}

/// Successful compile: the base64 artifact plus compiler stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileSuccessBody {
    pub wasm: String,
    pub output: String,
}

/// Error body shared by every failing response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
