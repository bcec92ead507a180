//! End-to-end tests: HTTP client → compile server → fake toolchain → sandbox

use cforge_common::{CompileSuccessBody, ErrorBody, SandboxConfig};
use cforge_sandbox::ExecutionHost;
use cforge_server::HealthBody;
use cforge_tests::common::{leftover_workspaces, setup_test_logging, source_for, FakeToolchain, TestServer};
use serde_json::json;

#[tokio::test]
async fn test_compile_then_execute_over_http() {
    setup_test_logging();
    let toolchain = FakeToolchain::install();
    let config = toolchain.config();
    let server = TestServer::start(&config).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/compile"))
        .json(&json!({ "code": source_for("hello") }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: CompileSuccessBody = response.json().await.unwrap();
    assert!(body.output.contains("compiling main.c"));

    let result = ExecutionHost::new(&SandboxConfig::default())
        .unwrap()
        .run(&body.wasm)
        .await
        .unwrap();
    assert_eq!(result.stdout_capture.as_deref(), Some("hello\n"));
    assert_eq!(result.describe(), "Program exited with code: 0");

    drop(client);
    server.stop().await.unwrap();
    assert_eq!(leftover_workspaces(&config.workspace.root), 0);
}

#[tokio::test]
async fn test_compile_error_over_http() {
    let toolchain = FakeToolchain::install();
    let server = TestServer::start(&toolchain.config()).await;

    let response = reqwest::Client::new()
        .post(server.url("/compile"))
        .json(&json!({ "code": "int main(void) {\n  SYNTAX_ERROR\n}\n" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "Compilation failed");
    assert!(body.details.unwrap().starts_with("main.c:2:5: error"));
}

#[tokio::test]
async fn test_missing_code_over_http() {
    let toolchain = FakeToolchain::install();
    let server = TestServer::start(&toolchain.config()).await;

    let response = reqwest::Client::new()
        .post(server.url("/compile"))
        .json(&json!({ "source": "int main(void) { return 0; }" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body, ErrorBody::new("No code provided"));
}

#[tokio::test]
async fn test_internal_failure_hides_paths() {
    let toolchain = FakeToolchain::install();
    let config = toolchain.config();
    let server = TestServer::start(&config).await;

    let response = reqwest::Client::new()
        .post(server.url("/compile"))
        .json(&json!({ "code": "int main(void) { return 0; }" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);

    let text = response.text().await.unwrap();
    let root = config.workspace.root.to_string_lossy().into_owned();
    assert!(!text.contains(&root));
    assert!(!text.contains("job-"));
}

#[tokio::test]
async fn test_health_names_toolchain() {
    let toolchain = FakeToolchain::install();
    let server = TestServer::start(&toolchain.config()).await;

    let body: HealthBody = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.status, "ok");
    assert_eq!(body.toolchain, "/bin/sh");
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let toolchain = FakeToolchain::install();
    let server = TestServer::start(&toolchain.config()).await;
    let url = server.url("/health");

    assert!(reqwest::get(&url).await.unwrap().status().is_success());
    server.stop().await.unwrap();
    assert!(reqwest::get(&url).await.is_err());
}
