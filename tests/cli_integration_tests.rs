//! End-to-end tests of the n8n-workflow-test binary

use assert_cmd::prelude::*;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const N8N_VARS: &[&str] = &[
    "N8N_HOST",
    "N8N_PORT",
    "N8N_PROTOCOL",
    "N8N_EMAIL",
    "N8N_PASSWORD",
    "N8N_BROWSER_ID",
    "N8N_POLL_DELAY_SECS",
    "N8N_REQUEST_TIMEOUT_SECS",
    "N8N_START_NODES",
    "N8N_DESTINATION_NODE",
    "N8N_LOG_LEVEL",
    "N8N_LOG_FORMAT",
];

/// Command with a clean N8N_* environment, run from an empty directory so no
/// stray .env or config file is picked up.
fn harness(workdir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("n8n-workflow-test").unwrap();
    cmd.current_dir(workdir.path());
    for var in N8N_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_missing_workflow_id_exits_with_usage() {
    let dir = tempfile::tempdir().unwrap();
    harness(&dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_extra_arguments_are_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    harness(&dir)
        .args(["42", "43"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_help_exits_successfully() {
    let dir = tempfile::tempdir().unwrap();
    harness(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WORKFLOW_ID"));
}

#[test]
fn test_missing_credentials_fail_the_test() {
    let dir = tempfile::tempdir().unwrap();
    harness(&dir)
        .arg("42")
        .env("N8N_HOST", "127.0.0.1")
        .env("N8N_PORT", "9")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("N8N_EMAIL"))
        .stdout(predicate::str::contains("Workflow test failed!"));
}

#[test]
fn test_unreachable_server_fails_the_test() {
    let dir = tempfile::tempdir().unwrap();
    harness(&dir)
        .arg("42")
        .env("N8N_HOST", "127.0.0.1")
        .env("N8N_PORT", "9")
        .env("N8N_EMAIL", "qa@example.com")
        .env("N8N_PASSWORD", "secret")
        .env("N8N_REQUEST_TIMEOUT_SECS", "5")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Error testing workflow"))
        .stdout(predicate::str::contains("Workflow test failed!"));
}

#[test]
fn test_missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    harness(&dir)
        .args(["42", "--config", "does-not-exist.toml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Configuration error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_workflow_exits_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"email": "qa@example.com"}}))
                .append_header("set-cookie", "n8n-auth=cli-token; Path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/workflows/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "42", "nodes": []}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/workflows/42/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"executionId": "7"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/executions/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"id": "7", "finished": true, "status": "success"}})),
        )
        .mount(&server)
        .await;

    let port = server.address().port().to_string();
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = harness(&dir);
    cmd.args(["42", "--poll-delay", "0"])
        .env("N8N_HOST", "127.0.0.1")
        .env("N8N_PORT", port)
        .env("N8N_EMAIL", "qa@example.com")
        .env("N8N_PASSWORD", "secret");

    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();
    output
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution ID: 7"))
        .stdout(predicate::str::contains("Workflow test completed successfully!"));
}
