//! Artifact packaging for transport to the caller

use crate::error::ArtifactError;
use crate::toolchain::ToolchainOutcome;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Binary-to-text encoding applied to artifact bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportEncoding {
    /// RFC 4648 standard alphabet with padding
    Base64,
}

impl TransportEncoding {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            TransportEncoding::Base64 => general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// A compiled module ready to be sent; lives only until the response is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub encoding: TransportEncoding,
    /// Encoded artifact bytes
    pub payload: String,
    /// Size of the raw artifact in bytes
    pub size: u64,
}

/// Reads a finished job's output and encodes it for transit
#[derive(Debug, Clone)]
pub struct ArtifactTransporter {
    encoding: TransportEncoding,
    max_bytes: u64,
}

impl ArtifactTransporter {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            encoding: TransportEncoding::Base64,
            max_bytes,
        }
    }

    /// Package the artifact of a successful toolchain run
    ///
    /// A zero exit code without an output file is an internal inconsistency
    /// and reported as [`ArtifactError::Missing`].
    pub async fn package(&self, outcome: &ToolchainOutcome) -> Result<CompiledArtifact, ArtifactError> {
        if !outcome.success() {
            return Err(ArtifactError::CompileFailed(outcome.exit_code));
        }

        let path = outcome.artifact_path.as_ref().ok_or(ArtifactError::Missing)?;

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(ArtifactError::Missing),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ArtifactError::Missing),
            Err(e) => return Err(ArtifactError::Read(e)),
        };
        if metadata.len() > self.max_bytes {
            return Err(ArtifactError::TooLarge {
                size: metadata.len(),
                max: self.max_bytes,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        // The file may have grown between the size check and the read.
        if bytes.len() as u64 > self.max_bytes {
            return Err(ArtifactError::TooLarge {
                size: bytes.len() as u64,
                max: self.max_bytes,
            });
        }

        Ok(CompiledArtifact {
            encoding: self.encoding,
            payload: self.encoding.encode(&bytes),
            size: bytes.len() as u64,
        })
    }
}
