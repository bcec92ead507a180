use std::path::PathBuf;
use thiserror::Error;

/// Failure to allocate a job workspace
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to prepare workspace root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace identifier collision: {0}")]
    Collision(String),

    #[error("Failed to create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operational failure while driving the external compiler
///
/// A compiler that runs and rejects the source is not an error here; that is
/// reported through a non-zero [`crate::ToolchainOutcome::exit_code`].
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("Failed to write source file: {0}")]
    WriteSource(#[source] std::io::Error),

    #[error("Failed to spawn toolchain '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for toolchain: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to read toolchain output: {0}")]
    Output(String),
}

/// The toolchain finished but left nothing that can be shipped
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Toolchain exited with code {0}")]
    CompileFailed(i32),

    #[error("Toolchain exited successfully but produced no artifact")]
    Missing,

    #[error("Artifact is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to read artifact: {0}")]
    Read(#[from] std::io::Error),
}

/// Caller-correctable problems with a compile request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No code provided")]
    EmptySource,

    #[error("Source too large")]
    SourceTooLarge { size: usize, max: usize },
}

/// Requests rejected before any workspace is allocated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Compiler busy, try again later")]
    Busy,
}
