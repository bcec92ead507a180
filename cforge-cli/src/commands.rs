//! CLI command implementations
//!
//! Each command returns whether it succeeded; `main` turns a failure into a
//! non-zero exit status after the command has printed its own report.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use cforge_common::{AppConfig, Catalog};
use cforge_compiler::{CompileRequest, CompileResponse, CompileService};
use cforge_sandbox::{ExecutionHost, ExecutionResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const WASM_MAGIC: &[u8] = b"\0asm";

/// Compile a file in-process, optionally saving or running the artifact
pub async fn execute_compile(
    config: &AppConfig,
    file: &Path,
    output: Option<&Path>,
    run: bool,
) -> Result<bool> {
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let service = CompileService::from_config(config).context("Failed to prepare workspace root")?;
    info!(file = %file.display(), toolchain = service.toolchain_name(), "Compiling");

    let response = service.handle(CompileRequest::new(source)).await?;

    let (artifact, compiler_output) = match response {
        CompileResponse::Success { artifact, output } => (artifact, output),
        CompileResponse::CompileFailure { diagnostics } => {
            eprintln!("Compilation failed");
            eprintln!("{}", diagnostics.trim_end());
            return Ok(false);
        }
        CompileResponse::InternalFailure { message } => bail!(message),
    };

    if !compiler_output.trim().is_empty() {
        eprintln!("{}", compiler_output.trim_end());
    }

    match output {
        Some(path) => {
            let bytes = general_purpose::STANDARD.decode(&artifact.payload)?;
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None if !run => println!("{}", artifact.payload),
        None => {}
    }

    if run {
        let host = ExecutionHost::new(&config.sandbox)?;
        let result = host.run(&artifact.payload).await?;
        print_execution(&result);
        return Ok(result.success());
    }

    Ok(true)
}

/// Run an artifact file in the sandbox
pub async fn execute_run(config: &AppConfig, artifact: &Path) -> Result<bool> {
    let contents = tokio::fs::read(artifact)
        .await
        .with_context(|| format!("Failed to read {}", artifact.display()))?;
    let bytes = artifact_bytes(contents)?;
    debug!(bytes = bytes.len(), "Loaded artifact");

    let host = ExecutionHost::new(&config.sandbox)?;
    match host.run_bytes(&bytes).await {
        Ok(result) => {
            print_execution(&result);
            Ok(result.success())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(false)
        }
    }
}

/// Raw module bytes from either a `.wasm` file or its base64 transport text
fn artifact_bytes(contents: Vec<u8>) -> Result<Vec<u8>> {
    if contents.starts_with(WASM_MAGIC) {
        return Ok(contents);
    }
    let text = String::from_utf8(contents).context("Artifact is neither WebAssembly nor base64 text")?;
    Ok(cforge_sandbox::decode_artifact(&text)?)
}

fn print_execution(result: &ExecutionResult) {
    if let Some(stdout) = result.stdout_capture.as_deref().filter(|s| !s.is_empty()) {
        print!("{}", stdout);
        if !stdout.ends_with('\n') {
            println!();
        }
    }
    println!("{}", result.describe());
}

/// List topics, or print one topic with its starter code
pub fn execute_topics(config: &AppConfig, slug: Option<&str>) -> Result<bool> {
    let catalog = Catalog::load_or_embedded(config.catalog.path.as_deref())?;

    let Some(slug) = slug else {
        for summary in catalog.summaries() {
            println!(
                "{:<24} {:<14} {}  ({})",
                summary.slug, summary.difficulty, summary.title, summary.duration
            );
        }
        return Ok(true);
    };

    let Some(topic) = catalog.get(slug) else {
        eprintln!("Unknown topic: {}", slug);
        return Ok(false);
    };

    println!("{} [{} · {}]", topic.title, topic.difficulty, topic.duration);
    println!();
    println!("{}", topic.summary);
    if !topic.key_concepts.is_empty() {
        println!();
        println!("Key concepts:");
        for concept in &topic.key_concepts {
            println!("  - {}", concept.concept);
        }
    }
    println!();
    println!("{}", topic.code.trim_end());
    println!();
    println!("Related resources:");
    for resource in topic.related_resources() {
        println!("  - {} <{}>", resource.title, resource.url);
    }
    Ok(true)
}

/// Write the default configuration
pub fn execute_config_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => AppConfig::config_path().context("Could not determine the user config directory")?,
    };
    write_default_config(&path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default().save_to(path)?;
    Ok(())
}

/// Print the effective configuration as JSON
pub fn execute_config_show(config: &AppConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
