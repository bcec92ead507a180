//! Execution outcome reported to the caller

use serde::{Deserialize, Serialize};

/// Trap text used when no configured entry point is a callable export
pub const MISSING_ENTRY_POINT: &str = "missing entry point";

/// Trap text used when the wall-clock budget runs out
pub const EXECUTION_TIMED_OUT: &str = "execution timed out";

/// Result of running one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Integer returned by the entry point or passed to `proc_exit`
    pub exit_code: Option<i32>,

    /// Set when the program faulted instead of returning
    pub trap: Option<String>,

    /// Program stdout, when capture is enabled
    pub stdout_capture: Option<String>,

    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub(crate) fn exited(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            trap: None,
            stdout_capture: None,
            duration_ms: 0,
        }
    }

    pub(crate) fn trapped(trap: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            trap: Some(trap.into()),
            stdout_capture: None,
            duration_ms: 0,
        }
    }

    /// Whether the program returned exit code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether no callable entry point was found
    pub fn missing_entry_point(&self) -> bool {
        self.trap.as_deref() == Some(MISSING_ENTRY_POINT)
    }

    /// One-line message for display next to the program output
    pub fn describe(&self) -> String {
        match (&self.exit_code, &self.trap) {
            (Some(code), _) => format!("Program exited with code: {code}"),
            (None, Some(_)) if self.missing_entry_point() => {
                "Wasm module instantiated but _main export is not a callable function.".to_string()
            }
            (None, Some(trap)) => format!("Error: {trap}"),
            (None, None) => "Program produced no result".to_string(),
        }
    }
}
