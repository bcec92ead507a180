//! Configuration management for cforge
//!
//! Every section has defaults, so an empty or missing file yields a usable
//! configuration. Durations use humantime syntax (`"30s"`, `"500ms"`).

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CFORGE_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Upper bound on an inbound request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            max_body_bytes: 256 * 1024,
        }
    }
}

/// External compiler invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Compiler executable, resolved through `PATH` unless absolute
    pub program: String,
    /// Arguments placed before the pinned source/output arguments
    pub launcher_args: Vec<String>,
    /// Arguments appended after `<source> -o <artifact>`
    pub extra_args: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Per-stream cap on captured stdout/stderr
    pub max_output_bytes: usize,
    /// Environment variables forwarded to the compiler; everything else is cleared
    pub pass_env: Vec<String>,
    /// Address-space rlimit for the compiler process (unix only)
    pub memory_limit_bytes: Option<u64>,
    /// CPU-time rlimit for the compiler process (unix only)
    pub cpu_limit_secs: Option<u64>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            program: "emcc".to_string(),
            launcher_args: Vec::new(),
            extra_args: vec![
                "-s".to_string(),
                "WASM=1".to_string(),
                "-s".to_string(),
                "EXPORTED_FUNCTIONS=_main".to_string(),
            ],
            timeout: Duration::from_secs(30),
            max_output_bytes: 64 * 1024,
            pass_env: ["PATH", "HOME", "EMSDK", "EM_CONFIG", "EM_CACHE", "LANG"]
                .into_iter()
                .map(String::from)
                .collect(),
            memory_limit_bytes: Some(2 * 1024 * 1024 * 1024),
            cpu_limit_secs: Some(60),
        }
    }
}

/// Per-request bounds enforced by the compile handler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum simultaneous compiler processes
    pub max_concurrent_compiles: usize,
    /// How long a request may wait for a compile slot; zero rejects at once
    #[serde(with = "humantime_serde")]
    pub queue_timeout: Duration,
    pub max_source_bytes: usize,
    pub max_artifact_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_compiles: 4,
            queue_timeout: Duration::from_secs(5),
            max_source_bytes: 128 * 1024,
            max_artifact_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Location of per-job scratch directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("cforge"),
        }
    }
}

/// Caller-side WebAssembly execution bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Initial size of the imported `env.memory`, in 64 KiB pages
    pub initial_memory_pages: u32,
    /// Hard ceiling for any linear memory in the sandbox, in 64 KiB pages
    pub max_memory_pages: u32,
    /// Instruction budget; exhausting it traps
    pub fuel: u64,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Export names tried, in order, as the program entry point
    pub entry_points: Vec<String>,
    /// Link an in-memory WASI stdout/stderr so printf output is captured
    pub capture_stdout: bool,
    /// Cap on captured stdout/stderr bytes
    pub max_capture_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            initial_memory_pages: 256,
            max_memory_pages: 1024,
            fuel: 500_000_000,
            timeout: Duration::from_secs(5),
            entry_points: vec!["_main".to_string(), "main".to_string(), "_start".to_string()],
            capture_stdout: true,
            max_capture_bytes: 64 * 1024,
        }
    }
}

/// Topic catalog source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// TOML catalog to serve instead of the embedded one
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Resolve and load the configuration.
    ///
    /// Order: `explicit`, then `$CFORGE_CONFIG`, then the per-user config
    /// file if it exists, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::load_from(Path::new(&path));
            }
        }

        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Per-user configuration file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cforge").join("config.toml"))
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.toolchain.program.trim().is_empty() {
            return Err(ConfigError::Invalid("toolchain.program is empty".into()));
        }
        if self.toolchain.timeout.is_zero() {
            return Err(ConfigError::Invalid("toolchain.timeout must be non-zero".into()));
        }
        if self.limits.max_concurrent_compiles == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_concurrent_compiles must be at least 1".into(),
            ));
        }
        if self.sandbox.initial_memory_pages > self.sandbox.max_memory_pages {
            return Err(ConfigError::Invalid(format!(
                "sandbox.initial_memory_pages ({}) exceeds max_memory_pages ({})",
                self.sandbox.initial_memory_pages, self.sandbox.max_memory_pages
            )));
        }
        if self.sandbox.entry_points.is_empty() {
            return Err(ConfigError::Invalid("sandbox.entry_points is empty".into()));
        }
        Ok(())
    }
}
