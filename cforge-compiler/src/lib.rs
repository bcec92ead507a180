//! cforge compile pipeline
//!
//! Accepts untrusted C source, compiles it to WebAssembly with an external
//! toolchain inside a throwaway workspace, and packages the artifact for
//! transport. Each stage is a separate module:
//!
//! - [`workspace`]: per-job scratch directories with guaranteed removal
//! - [`toolchain`]: bounded, shell-free compiler invocation
//! - [`artifact`]: artifact read-back and base64 packaging
//! - [`service`]: request validation, admission control and orchestration

pub mod artifact;
mod error;
pub mod service;
pub mod toolchain;
pub mod workspace;

pub use artifact::{ArtifactTransporter, CompiledArtifact, TransportEncoding};
pub use error::{ArtifactError, RequestError, ToolchainError, ValidationError, WorkspaceError};
pub use service::{CompileRequest, CompileResponse, CompileService};
pub use toolchain::{
    CommandToolchain, Toolchain, ToolchainOutcome, TIMEOUT_EXIT_CODE, TIMEOUT_MESSAGE,
};
pub use workspace::{CompileJob, JobId, WorkspaceManager};
