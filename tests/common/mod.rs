//! Common test utilities shared across integration and E2E tests

pub mod fake_toolchain;
pub mod test_server;

// Re-export commonly used items
pub use fake_toolchain::*;
pub use test_server::*;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cforge_compiler=debug,cforge_sandbox=debug,cforge_server=debug")
        .with_test_writer()
        .try_init();
}

/// Number of entries left under a workspace root
pub fn leftover_workspaces(root: &std::path::Path) -> usize {
    std::fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0)
}
