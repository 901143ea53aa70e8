use serde::Serialize;
use statig::prelude::*;
use std::time::Duration;
use tracing::{error, info, Instrument};

use super::state_machine::{RunEvent, RunPhase, TestRun};
use crate::config::N8nConfig;
use crate::http::HttpClient;
use crate::n8n::{
    Credentials, ExecutionParams, ExecutionRecord, N8nClient, N8nError, Session, WorkflowApi,
};
use crate::observability::OperationTimer;
use crate::telemetry::{create_run_span, generate_correlation_id};

/// Everything the CLI needs to report about one run.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub workflow_id: String,
    pub passed: bool,
    pub phase: RunPhase,
    /// Phase the run was in when it failed.
    pub failed_in: Option<RunPhase>,
    pub execution_id: Option<String>,
    pub record: Option<ExecutionRecord>,
    pub error: Option<String>,
    /// Human-readable progress and diagnostic lines, in order.
    pub diagnostics: Vec<String>,
}

/// Drives one workflow through login, execution, a single poll and a verdict.
pub struct WorkflowTestRunner<A = N8nClient> {
    api: A,
    base_url: String,
    credentials: Option<Credentials>,
    params: ExecutionParams,
    poll_delay: Duration,
}

impl WorkflowTestRunner<N8nClient> {
    /// Build a runner talking to the instance described by `config`.
    pub fn from_config(config: &N8nConfig) -> Result<Self, N8nError> {
        let http = HttpClient::new(&config.browser_id, config.request_timeout())?;
        let mut runner = Self::new(N8nClient::new(http), config.base_url())
            .with_params(config.execution_params())
            .with_poll_delay(config.poll_delay());
        runner.credentials = config.credentials().ok();
        Ok(runner)
    }
}

impl<A: WorkflowApi> WorkflowTestRunner<A> {
    pub fn new(api: A, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into(),
            credentials: None,
            params: ExecutionParams::default(),
            poll_delay: Duration::from_secs(2),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_params(mut self, params: ExecutionParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run the test and return only the verdict.
    pub async fn run_test(&self, workflow_id: &str) -> bool {
        self.run(workflow_id).await.passed
    }

    /// Run the test. Never fails: every error becomes a failed outcome.
    pub async fn run(&self, workflow_id: &str) -> TestOutcome {
        let correlation_id = generate_correlation_id();
        let span = create_run_span(workflow_id, &correlation_id);
        self.run_in_span(workflow_id).instrument(span).await
    }

    async fn run_in_span(&self, workflow_id: &str) -> TestOutcome {
        let mut machine = TestRun::new(workflow_id).state_machine();
        let mut diagnostics = Vec::new();
        let mut record = None;

        let result = self
            .drive(workflow_id, &mut machine, &mut diagnostics, &mut record)
            .await;

        let error = match result {
            Ok(()) => None,
            Err(err) => {
                let phase = machine.inner().phase();
                error!(
                    error = %err,
                    status = err.status(),
                    phase = %phase,
                    "Error testing workflow"
                );
                diagnostics.push(format!("Error testing workflow: {err}"));
                if let Some(body) = err.response_body() {
                    error!(body, "n8n response content");
                    diagnostics.push(format!("Response content: {body}"));
                }
                machine.handle(&RunEvent::Failed {
                    reason: err.to_string(),
                });
                Some(err.to_string())
            }
        };

        let run = machine.inner();
        info!(
            workflow_id = run.workflow_id(),
            passed = run.is_passed(),
            phase = %run.phase(),
            "Workflow test finished"
        );
        TestOutcome {
            workflow_id: run.workflow_id().to_string(),
            passed: run.is_passed(),
            phase: run.phase(),
            failed_in: run.failed_in(),
            execution_id: run.execution_id().map(str::to_string),
            record,
            error,
            diagnostics,
        }
    }

    async fn drive(
        &self,
        workflow_id: &str,
        machine: &mut StateMachine<TestRun>,
        diagnostics: &mut Vec<String>,
        record: &mut Option<ExecutionRecord>,
    ) -> Result<(), N8nError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            N8nError::Config("N8N_EMAIL and N8N_PASSWORD must both be set".to_string())
        })?;
        let mut session = Session::new(self.base_url.as_str());

        let timer = OperationTimer::new("authenticate");
        self.api.authenticate(&mut session, credentials).await?;
        timer.finish();
        machine.handle(&RunEvent::LoggedIn);
        diagnostics.push("Login successful!".to_string());

        let timer = OperationTimer::new("start_execution");
        let execution_id = self
            .api
            .start_execution(&session, workflow_id, &self.params)
            .await?;
        timer.finish();
        tracing::Span::current().record("execution.id", execution_id.as_str());
        machine.handle(&RunEvent::ExecutionSubmitted {
            execution_id: execution_id.clone(),
        });
        diagnostics.push(format!("Workflow execution started. Execution ID: {execution_id}"));

        diagnostics.push(format!("Waiting for execution {execution_id} to complete..."));
        tokio::time::sleep(self.poll_delay).await;

        let timer = OperationTimer::new("poll_status");
        let status = self.api.poll_status(&session, &execution_id).await?;
        timer.finish();
        machine.handle(&RunEvent::StatusChecked);

        if status.is_success() {
            diagnostics.push("Workflow executed successfully!".to_string());
        } else {
            diagnostics.push(format!(
                "Workflow execution failed with status: {}",
                status.raw_status.as_deref().unwrap_or("unknown")
            ));
            if let Some(detail) = &status.error {
                diagnostics.push(format!("Error details: {detail}"));
            }
        }
        machine.handle(&RunEvent::Concluded {
            passed: status.is_success(),
        });
        *record = Some(status);
        Ok(())
    }
}

/// Build a client from `config` and test one workflow.
///
/// Returns `true` only when the execution finished successfully. Nothing
/// escapes: configuration and API errors are logged and yield `false`.
pub async fn run_test(config: &N8nConfig, workflow_id: &str) -> bool {
    match WorkflowTestRunner::from_config(config) {
        Ok(runner) => {
            let passed = runner.run_test(workflow_id).await;
            runner.api().http().metrics().log_stats();
            passed
        }
        Err(err) => {
            error!(error = %err, "Could not create n8n client");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::n8n::{ExecutionStatus, WorkflowDefinition};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted stand-in for the n8n API that records the calls it receives.
    struct FakeApi {
        login_ok: bool,
        status: (bool, &'static str),
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeApi {
        fn new(login_ok: bool, finished: bool, status: &'static str) -> Self {
            Self {
                login_ok,
                status: (finished, status),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkflowApi for FakeApi {
        async fn authenticate(
            &self,
            session: &mut Session,
            _credentials: &Credentials,
        ) -> Result<String, N8nError> {
            self.calls.lock().unwrap().push("authenticate");
            if !self.login_ok {
                return Err(N8nError::auth("Failed to get authentication cookie"));
            }
            session.establish("tok".to_string(), None);
            Ok("tok".to_string())
        }

        async fn fetch_workflow(
            &self,
            session: &Session,
            _workflow_id: &str,
        ) -> Result<WorkflowDefinition, N8nError> {
            session.require_token()?;
            self.calls.lock().unwrap().push("fetch_workflow");
            Ok(WorkflowDefinition::new(serde_json::json!({"nodes": []})))
        }

        async fn start_execution(
            &self,
            session: &Session,
            _workflow_id: &str,
            _params: &ExecutionParams,
        ) -> Result<String, N8nError> {
            session.require_token()?;
            self.calls.lock().unwrap().push("start_execution");
            Ok("118".to_string())
        }

        async fn poll_status(
            &self,
            session: &Session,
            execution_id: &str,
        ) -> Result<ExecutionRecord, N8nError> {
            session.require_token()?;
            self.calls.lock().unwrap().push("poll_status");
            let (finished, status) = self.status;
            Ok(ExecutionRecord::from_payload(
                execution_id,
                &serde_json::json!({"finished": finished, "status": status}),
            ))
        }
    }

    fn runner(api: FakeApi) -> WorkflowTestRunner<FakeApi> {
        WorkflowTestRunner::new(api, "http://localhost:5678/rest")
            .with_credentials(Credentials::new("qa@example.com", "pw"))
            .with_poll_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_successful_run_passes() {
        let runner = runner(FakeApi::new(true, true, "success"));
        let outcome = runner.run("42").await;

        assert!(outcome.passed);
        assert_eq!(outcome.workflow_id, "42");
        assert_eq!(outcome.phase, RunPhase::Passed);
        assert_eq!(outcome.execution_id.as_deref(), Some("118"));
        assert_eq!(
            outcome.record.as_ref().map(|r| r.status),
            Some(ExecutionStatus::Success)
        );
        assert_eq!(
            runner.api().calls(),
            vec!["authenticate", "start_execution", "poll_status"]
        );
    }

    #[tokio::test]
    async fn test_running_execution_fails_without_repolling() {
        let runner = runner(FakeApi::new(true, false, "running"));

        assert!(!runner.run_test("42").await);
        let polls = runner.api().calls().iter().filter(|c| **c == "poll_status").count();
        assert_eq!(polls, 1);
    }

    #[tokio::test]
    async fn test_login_failure_stops_the_run() {
        let runner = runner(FakeApi::new(false, true, "success"));
        let outcome = runner.run("42").await;

        assert!(!outcome.passed);
        assert_eq!(outcome.failed_in, Some(RunPhase::Unauthenticated));
        assert_eq!(runner.api().calls(), vec!["authenticate"]);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|line| line.contains("Failed to get authentication cookie")));
    }

    #[tokio::test]
    async fn test_missing_credentials_make_no_calls() {
        let runner = WorkflowTestRunner::new(
            FakeApi::new(true, true, "success"),
            "http://localhost:5678/rest",
        )
        .with_poll_delay(Duration::ZERO);
        let outcome = runner.run("42").await;

        assert!(!outcome.passed);
        assert!(runner.api().calls().is_empty());
        assert!(outcome.error.unwrap().contains("N8N_EMAIL"));
    }

    #[tokio::test]
    async fn test_failed_execution_reports_status() {
        let runner = runner(FakeApi::new(true, false, "error"));
        let outcome = runner.run("42").await;

        assert!(!outcome.passed);
        assert_eq!(outcome.failed_in, Some(RunPhase::StatusChecked));
        assert!(outcome
            .diagnostics
            .contains(&"Workflow execution failed with status: error".to_string()));
    }
}
