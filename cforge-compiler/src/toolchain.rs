//! Toolchain trait and implementations

mod process;

use crate::error::ToolchainError;
use crate::workspace::CompileJob;
use async_trait::async_trait;
use std::path::PathBuf;

pub use process::{CommandToolchain, TRUNCATION_MARKER};

/// Exit code reported when the compiler is killed for exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Diagnostic text reported for a timed-out compile
pub const TIMEOUT_MESSAGE: &str = "compilation timed out";

/// Result of one compiler run; never mutated after creation
#[derive(Debug, Clone)]
pub struct ToolchainOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Set only when the expected output file exists after the run
    pub artifact_path: Option<PathBuf>,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ToolchainOutcome {
    /// Check if the compiler accepted the source
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Turns source text inside a job workspace into a bytecode artifact
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Write `source` into the job workspace and compile it
    async fn compile(&self, job: &CompileJob, source: &str)
        -> Result<ToolchainOutcome, ToolchainError>;

    /// Get toolchain name
    fn name(&self) -> &str;
}
