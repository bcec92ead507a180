//! Compile service - main entry point

use crate::artifact::{ArtifactTransporter, CompiledArtifact};
use crate::error::{RequestError, ValidationError, WorkspaceError};
use crate::toolchain::{CommandToolchain, Toolchain};
use crate::workspace::{CompileJob, WorkspaceManager};
use cforge_common::{AppConfig, CompileRequestBody, LimitsConfig};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn};

/// Message returned for failures the caller cannot act on
pub const INTERNAL_FAILURE_MESSAGE: &str = "Internal compiler service error";

/// Message returned when the toolchain succeeded but left nothing to ship
pub const ARTIFACT_FAILURE_MESSAGE: &str = "Compiler produced no usable output";

/// Request to compile one translation unit
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source_code: String,
}

impl CompileRequest {
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
        }
    }
}

impl From<CompileRequestBody> for CompileRequest {
    fn from(body: CompileRequestBody) -> Self {
        Self::new(body.code.unwrap_or_default())
    }
}

/// Outcome of a compile request that got as far as the toolchain
#[derive(Debug, Clone)]
pub enum CompileResponse {
    Success {
        artifact: CompiledArtifact,
        /// Compiler stdout
        output: String,
    },
    /// The toolchain rejected the source; diagnostics are passed through verbatim
    CompileFailure { diagnostics: String },
    /// Operational failure; the message is generic and never carries paths
    InternalFailure { message: String },
}

impl CompileResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileResponse::Success { .. })
    }

    fn internal(message: &str) -> Self {
        CompileResponse::InternalFailure {
            message: message.to_string(),
        }
    }
}

/// Drives workspace → toolchain → transporter for each request
pub struct CompileService {
    workspaces: WorkspaceManager,
    toolchain: Arc<dyn Toolchain>,
    transporter: ArtifactTransporter,
    permits: Arc<Semaphore>,
    limits: LimitsConfig,
}

impl CompileService {
    /// Create a compile service with the given toolchain
    pub fn new(
        workspaces: WorkspaceManager,
        toolchain: impl Toolchain + 'static,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            workspaces,
            toolchain: Arc::new(toolchain),
            transporter: ArtifactTransporter::new(limits.max_artifact_bytes),
            permits: Arc::new(Semaphore::new(limits.max_concurrent_compiles.max(1))),
            limits,
        }
    }

    /// Build the service described by `config`, using the external compiler
    pub fn from_config(config: &AppConfig) -> Result<Self, WorkspaceError> {
        let workspaces = WorkspaceManager::new(&config.workspace.root)?;
        Ok(Self::new(
            workspaces,
            CommandToolchain::new(config.toolchain.clone()),
            config.limits.clone(),
        ))
    }

    /// Get the toolchain name
    pub fn toolchain_name(&self) -> &str {
        self.toolchain.name()
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Compile slots currently free
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Handle one compile request
    ///
    /// Validation and admission failures are returned as [`RequestError`]
    /// before any workspace exists. Everything after that is folded into a
    /// [`CompileResponse`], and the workspace is gone by the time this returns.
    pub async fn handle(&self, request: CompileRequest) -> Result<CompileResponse, RequestError> {
        self.validate(&request)?;
        let _permit = self.admit().await?;

        let mut job = match self.workspaces.acquire() {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to acquire workspace");
                return Ok(CompileResponse::internal(INTERNAL_FAILURE_MESSAGE));
            }
        };

        let response = self.run_job(&job, &request).await;
        // Dropping the job would also release it; releasing here keeps the
        // workspace lifetime inside the permit.
        self.workspaces.release(&mut job);
        Ok(response)
    }

    fn validate(&self, request: &CompileRequest) -> Result<(), ValidationError> {
        let size = request.source_code.len();
        if size == 0 {
            return Err(ValidationError::EmptySource);
        }
        if size > self.limits.max_source_bytes {
            return Err(ValidationError::SourceTooLarge {
                size,
                max: self.limits.max_source_bytes,
            });
        }
        Ok(())
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit, RequestError> {
        let permits = Arc::clone(&self.permits);

        let permit = if self.limits.queue_timeout.is_zero() {
            permits.try_acquire_owned().ok()
        } else {
            match tokio::time::timeout(self.limits.queue_timeout, permits.acquire_owned()).await {
                Ok(Ok(permit)) => Some(permit),
                _ => None,
            }
        };

        permit.ok_or_else(|| {
            warn!(
                max_concurrent = self.limits.max_concurrent_compiles,
                "Rejecting compile request, no free slot"
            );
            RequestError::Busy
        })
    }

    async fn run_job(&self, job: &CompileJob, request: &CompileRequest) -> CompileResponse {
        let outcome = match self.toolchain.compile(job, &request.source_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job.id(), error = %e, "Toolchain invocation failed");
                return CompileResponse::internal(INTERNAL_FAILURE_MESSAGE);
            }
        };

        if !outcome.success() {
            info!(
                job_id = %job.id(),
                exit_code = outcome.exit_code,
                timed_out = outcome.timed_out,
                "Compilation failed"
            );
            let diagnostics = if outcome.stderr.trim().is_empty() {
                format!("compiler exited with code {}", outcome.exit_code)
            } else {
                outcome.stderr
            };
            return CompileResponse::CompileFailure { diagnostics };
        }

        match self.transporter.package(&outcome).await {
            Ok(artifact) => {
                info!(
                    job_id = %job.id(),
                    artifact_bytes = artifact.size,
                    elapsed_ms = outcome.duration_ms,
                    "Compilation succeeded"
                );
                CompileResponse::Success {
                    artifact,
                    output: outcome.stdout,
                }
            }
            Err(e) => {
                error!(job_id = %job.id(), error = %e, "Failed to package artifact");
                CompileResponse::internal(ARTIFACT_FAILURE_MESSAGE)
            }
        }
    }
}
