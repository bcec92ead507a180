//! Integration tests for executing compiled artifacts
//!
//! Artifacts travel through the same base64 transport the HTTP endpoint
//! uses before they reach the execution host.

use assert_matches::assert_matches;
use cforge_common::SandboxConfig;
use cforge_compiler::{CompileRequest, CompileResponse, CompileService};
use cforge_sandbox::{ExecutionHost, ExecutionResult, SandboxError, EXECUTION_TIMED_OUT};
use cforge_tests::common::{source_for, FakeToolchain};
use std::time::Duration;

async fn compile_and_run(fixture: &str, sandbox: &SandboxConfig) -> ExecutionResult {
    let toolchain = FakeToolchain::install();
    let service = CompileService::from_config(&toolchain.config()).unwrap();

    let payload = match service.handle(CompileRequest::new(source_for(fixture))).await.unwrap() {
        CompileResponse::Success { artifact, .. } => artifact.payload,
        other => panic!("Expected success, got {:?}", other),
    };

    ExecutionHost::new(sandbox).unwrap().run(&payload).await.unwrap()
}

#[tokio::test]
async fn test_exit_code_reported() {
    let result = compile_and_run("ret7", &SandboxConfig::default()).await;
    assert_eq!(result.exit_code, Some(7));
    assert_eq!(result.describe(), "Program exited with code: 7");
}

#[tokio::test]
async fn test_printf_output_captured() {
    let result = compile_and_run("hello", &SandboxConfig::default()).await;
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout_capture.as_deref(), Some("hello\n"));
}

#[tokio::test]
async fn test_emscripten_style_imports_and_signature() {
    let result = compile_and_run("emscripten", &SandboxConfig::default()).await;
    assert_eq!(result.trap, None);
    assert_eq!(result.exit_code, Some(5));
}

#[tokio::test]
async fn test_trap_is_reported_not_raised() {
    let result = compile_and_run("trap", &SandboxConfig::default()).await;
    assert_eq!(result.exit_code, None);
    assert!(result.describe().starts_with("Error: "));
}

#[tokio::test]
async fn test_runaway_program_is_stopped() {
    let sandbox = SandboxConfig {
        fuel: u64::MAX / 2,
        timeout: Duration::from_millis(300),
        ..SandboxConfig::default()
    };
    let result = compile_and_run("spin", &sandbox).await;
    assert_eq!(result.trap.as_deref(), Some(EXECUTION_TIMED_OUT));
}

#[tokio::test]
async fn test_corrupted_transport_is_rejected() {
    let host = ExecutionHost::new(&SandboxConfig::default()).unwrap();

    assert_matches!(host.run("AGFz!!").await, Err(SandboxError::Decode(_)));
    // Valid base64, but not a module
    assert_matches!(host.run("aGVsbG8=").await, Err(SandboxError::Instantiation(_)));
}
