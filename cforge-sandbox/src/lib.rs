//! # cforge-sandbox
//!
//! Caller-side execution host for compiled artifacts.
//!
//! An artifact arrives base64-encoded from the compile service and runs in a
//! wasmtime store bounded by fuel, a memory ceiling, and a wall-clock
//! timeout. The only capabilities a module can import are `env.memory`,
//! `env.table`, and (when stdout capture is on) WASI preview1 backed by an
//! in-memory context.
//!
//! ```no_run
//! use cforge_common::SandboxConfig;
//! use cforge_sandbox::ExecutionHost;
//!
//! # async fn example(encoded: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let host = ExecutionHost::new(&SandboxConfig::default())?;
//! let result = host.run(encoded).await?;
//! println!("{}", result.describe());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod host;
pub mod limits;
pub mod types;

pub use error::{Result, SandboxError};
pub use host::{decode_artifact, ExecutionHost};
pub use limits::SandboxLimits;
pub use types::{ExecutionResult, EXECUTION_TIMED_OUT, MISSING_ENTRY_POINT};
