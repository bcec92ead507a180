use thiserror::Error;

/// Failures that prevent an artifact from running at all.
///
/// Traps and a missing entry point are not errors; they are reported
/// through [`crate::ExecutionResult`].
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("artifact is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to instantiate module: {0}")]
    Instantiation(String),

    #[error("failed to initialize runtime: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
