//! Resource limits configuration for sandboxed execution

use cforge_common::SandboxConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size of one WebAssembly page
pub const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Resource limits for one artifact execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    /// Wall-clock budget for the entry point call
    pub timeout: Duration,

    /// Instruction fuel; running out traps
    pub fuel: u64,

    /// Floor for the size of an imported `env.memory`, in pages
    pub initial_memory_pages: u32,

    /// Ceiling for any linear memory, in pages
    pub max_memory_pages: u32,

    /// Cap on captured stdout/stderr bytes
    pub max_capture_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self::from(&SandboxConfig::default())
    }
}

impl From<&SandboxConfig> for SandboxLimits {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            timeout: config.timeout,
            fuel: config.fuel,
            initial_memory_pages: config.initial_memory_pages,
            max_memory_pages: config.max_memory_pages,
            max_capture_bytes: config.max_capture_bytes,
        }
    }
}

impl SandboxLimits {
    /// Tight limits for exercises that should finish instantly
    pub fn strict() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            fuel: 50_000_000,
            initial_memory_pages: 16,
            max_memory_pages: 256,
            max_capture_bytes: 16 * 1024,
        }
    }

    /// Generous limits for longer-running programs
    pub fn permissive() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            fuel: 10_000_000_000,
            initial_memory_pages: 256,
            max_memory_pages: 16 * 1024,
            max_capture_bytes: 1024 * 1024,
        }
    }

    /// Ceiling for linear memory in bytes
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * WASM_PAGE_SIZE
    }
}
