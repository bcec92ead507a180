//! Shared building blocks for the cforge compile service.
//!
//! Holds the JSON wire shapes of the compile endpoint, the TOML
//! configuration model and the read-only topic catalog.

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{Catalog, KeyConcept, QuizQuestion, Resource, ResourceKind, Topic, TopicSummary};
pub use config::{
    AppConfig, CatalogConfig, LimitsConfig, SandboxConfig, ServerConfig, ToolchainConfig,
    WorkspaceConfig,
};
pub use error::{CatalogError, ConfigError};
pub use types::{CompileRequestBody, CompileSuccessBody, ErrorBody};
