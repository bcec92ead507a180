//! Integration tests for the compile pipeline driven by a fake toolchain
//!
//! These tests verify that the compile service:
//! - Returns artifacts that are exactly what the toolchain produced
//! - Keeps concurrent jobs isolated from each other
//! - Passes diagnostics through verbatim
//! - Terminates hung compilers and never leaks workspaces

use assert_matches::assert_matches;
use base64::{engine::general_purpose, Engine as _};
use cforge_common::SandboxConfig;
use cforge_compiler::{CompileRequest, CompileResponse, CompileService, RequestError, TIMEOUT_MESSAGE};
use cforge_sandbox::ExecutionHost;
use cforge_tests::common::{leftover_workspaces, setup_test_logging, source_for, FakeToolchain, MAX_EXIT_FIXTURE};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn artifact_bytes(response: &CompileResponse) -> Vec<u8> {
    match response {
        CompileResponse::Success { artifact, .. } => general_purpose::STANDARD
            .decode(&artifact.payload)
            .expect("Artifact is not base64"),
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_artifact_matches_toolchain_output() {
    setup_test_logging();
    let toolchain = FakeToolchain::install();
    let config = toolchain.config();
    let service = CompileService::from_config(&config).unwrap();

    let response = service.handle(CompileRequest::new(source_for("ret7"))).await.unwrap();

    assert_eq!(artifact_bytes(&response), toolchain.fixture_bytes("ret7"));
    assert_matches!(&response, CompileResponse::Success { output, .. } if output.contains("compiling main.c"));
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}

#[tokio::test]
async fn test_repeated_compiles_run_identically() {
    let toolchain = FakeToolchain::install();
    let service = CompileService::from_config(&toolchain.config()).unwrap();

    let host = ExecutionHost::new(&SandboxConfig::default()).unwrap();

    let mut exit_codes = Vec::new();
    for _ in 0..2 {
        let response = service.handle(CompileRequest::new(source_for("ret3"))).await.unwrap();
        let result = host.run_bytes(&artifact_bytes(&response)).await.unwrap();
        exit_codes.push(result.exit_code);
    }

    assert_eq!(exit_codes, vec![Some(3), Some(3)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_isolated() {
    setup_test_logging();
    let toolchain = FakeToolchain::install();
    let mut config = toolchain.config();
    config.limits.max_concurrent_compiles = 4;
    config.limits.queue_timeout = Duration::from_secs(30);
    let service = Arc::new(CompileService::from_config(&config).unwrap());

    let tasks: Vec<_> = (0..=MAX_EXIT_FIXTURE)
        .map(|code| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let response = service
                    .handle(CompileRequest::new(source_for(&format!("ret{code}"))))
                    .await
                    .unwrap();
                (code, response)
            })
        })
        .collect();

    for task in tasks {
        let (code, response) = task.await.unwrap();
        assert_eq!(
            artifact_bytes(&response),
            toolchain.fixture_bytes(&format!("ret{code}")),
            "request {code} received another job's artifact"
        );
    }

    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
    assert_eq!(service.available_slots(), 4);
}

#[tokio::test]
async fn test_diagnostics_pass_through_verbatim() {
    let toolchain = FakeToolchain::install();
    let config = toolchain.config();
    let service = CompileService::from_config(&config).unwrap();

    let source = "#include <stdio.h>\nint main(void) {\n    SYNTAX_ERROR\n}\n";
    let response = service.handle(CompileRequest::new(source)).await.unwrap();

    assert_matches!(
        response,
        CompileResponse::CompileFailure { diagnostics }
            if diagnostics.trim_end() == "main.c:3:5: error: expected ';' before '}' token"
    );
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}

#[tokio::test]
async fn test_hung_compiler_is_terminated() {
    let toolchain = FakeToolchain::install();
    let mut config = toolchain.config();
    config.toolchain.timeout = Duration::from_millis(500);
    let service = CompileService::from_config(&config).unwrap();

    let started = Instant::now();
    let response = service.handle(CompileRequest::new("HANG")).await.unwrap();

    assert_matches!(response, CompileResponse::CompileFailure { diagnostics } if diagnostics == TIMEOUT_MESSAGE);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}

#[tokio::test]
async fn test_missing_artifact_is_internal_failure() {
    let toolchain = FakeToolchain::install();
    let config = toolchain.config();
    let service = CompileService::from_config(&config).unwrap();

    let response = service
        .handle(CompileRequest::new("int main(void) { return 0; }"))
        .await
        .unwrap();

    assert_matches!(response, CompileResponse::InternalFailure { message } if !message.contains('/'));
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}

#[tokio::test]
async fn test_empty_source_never_reaches_toolchain() {
    let toolchain = FakeToolchain::install();
    let config = toolchain.config();
    let service = CompileService::from_config(&config).unwrap();

    let err = service.handle(CompileRequest::new("")).await.unwrap_err();

    assert_eq!(err.to_string(), "No code provided");
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_when_all_slots_taken() {
    let toolchain = FakeToolchain::install();
    let mut config = toolchain.config();
    config.limits.max_concurrent_compiles = 1;
    config.limits.queue_timeout = Duration::ZERO;
    config.toolchain.timeout = Duration::from_secs(1);
    let service = Arc::new(CompileService::from_config(&config).unwrap());

    let hung = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.handle(CompileRequest::new("HANG")).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let rejected = service.handle(CompileRequest::new(source_for("ret0"))).await;
    assert_matches!(rejected, Err(RequestError::Busy));

    assert_matches!(hung.await.unwrap(), Ok(CompileResponse::CompileFailure { .. }));
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}
