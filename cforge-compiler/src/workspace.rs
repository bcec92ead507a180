//! Per-job scratch directories
//!
//! Every compile job owns exactly one directory under the workspace root.
//! The [`CompileJob`] value is the scoped handle: dropping it (or calling
//! [`CompileJob::release`]) removes the directory, so cleanup happens on
//! every exit path including errors, timeouts and cancelled futures.

use crate::error::WorkspaceError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Name of the source file written into each workspace
pub const SOURCE_FILE: &str = "main.c";

/// Name the toolchain is told to write its output to
pub const ARTIFACT_FILE: &str = "main.wasm";

const JOB_PREFIX: &str = "job-";

/// Collision-resistant job identifier: millisecond timestamp plus random suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}-{}", JOB_PREFIX, millis, &suffix[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An in-flight compile job and the workspace it owns
#[derive(Debug)]
pub struct CompileJob {
    id: JobId,
    path: PathBuf,
    created_at: DateTime<Utc>,
    released: bool,
}

impl CompileJob {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn source_path(&self) -> PathBuf {
        self.path.join(SOURCE_FILE)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.path.join(ARTIFACT_FILE)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the workspace and everything in it (idempotent)
    ///
    /// Removal failures are logged and otherwise ignored so they never mask
    /// the job's own outcome.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if !self.path.exists() {
            return;
        }

        if let Ok(entries) = fs::read_dir(&self.path) {
            for entry in entries.flatten() {
                let path = entry.path();
                let result = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                if let Err(e) = result {
                    warn!(job_id = %self.id, file = %path.display(), error = %e, "Failed to remove workspace file");
                }
            }
        }

        match fs::remove_dir(&self.path) {
            Ok(()) => debug!(job_id = %self.id, "Released workspace"),
            Err(e) => {
                warn!(job_id = %self.id, path = %self.path.display(), error = %e, "Failed to remove workspace directory")
            }
        }
    }
}

impl Drop for CompileJob {
    fn drop(&mut self) {
        self.release();
    }
}

/// Allocates job workspaces under a single dedicated root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create the manager, creating `root` if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| WorkspaceError::Root {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, uniquely named workspace
    pub fn acquire(&self) -> Result<CompileJob, WorkspaceError> {
        let id = JobId::generate();
        let path = self.root.join(id.as_str());

        create_private_dir(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                WorkspaceError::Collision(id.to_string())
            } else {
                WorkspaceError::Create {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        debug!(job_id = %id, "Acquired workspace");
        Ok(CompileJob {
            id,
            path,
            created_at: Utc::now(),
            released: false,
        })
    }

    /// Release a job's workspace; safe to call repeatedly
    pub fn release(&self, job: &mut CompileJob) {
        job.release();
    }

    /// Remove job directories older than `max_age`, left behind by a crash
    pub fn purge_stale(&self, max_age: Duration) -> usize {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };
        let now = SystemTime::now();
        let mut purged = 0;

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(JOB_PREFIX) {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());

            if matches!(age, Some(age) if age >= max_age) {
                match fs::remove_dir_all(entry.path()) {
                    Ok(()) => purged += 1,
                    Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to purge stale workspace"),
                }
            }
        }

        purged
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir(path)
}
