use anyhow::{Context, Result};
use cforge_common::{AppConfig, Catalog};
use cforge_compiler::CompileService;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

pub mod http_server;

pub use http_server::{create_router, start_server, AppState, HealthBody};

/// Workspaces older than this at startup are leftovers of a crashed process
const STALE_WORKSPACE_AGE: Duration = Duration::from_secs(10 * 60);

/// Initialize tracing to stderr and, when `log_file` is given, a file.
///
/// The returned guard flushes the file writer and must be held for the
/// lifetime of the process.
pub fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "cforge_common={0},cforge_compiler={0},cforge_sandbox={0},cforge_server={0},cforge_cli={0}",
            log_level
        ))
    });

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "cforge.log".into());
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Build the application state described by `config`
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let catalog = Catalog::load_or_embedded(config.catalog.path.as_deref())
        .context("Failed to load topic catalog")?;
    let service = CompileService::from_config(config).context("Failed to prepare workspace root")?;

    let purged = service.workspaces().purge_stale(STALE_WORKSPACE_AGE);
    if purged > 0 {
        warn!(purged, "Removed stale workspaces from a previous run");
    }

    Ok(AppState::new(service, catalog, config.server.max_body_bytes))
}

/// Bind the configured address and serve until Ctrl-C
pub async fn run_server_app(config: AppConfig) -> Result<()> {
    info!(
        toolchain = %config.toolchain.program,
        workspace_root = %config.workspace.root.display(),
        max_concurrent = config.limits.max_concurrent_compiles,
        "Starting cforge server"
    );

    let state = build_state(&config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    start_server(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
