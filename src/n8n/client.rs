use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::errors::N8nError;
use super::session::{extract_auth_cookie, Credentials, Session};
use super::types::{
    id_field, normalize_envelope, ExecutionParams, ExecutionRecord, ExecutionRequest,
    ExecutionStatus, WorkflowDefinition,
};
use crate::http::HttpClient;

/// Operations the harness needs from an n8n server.
///
/// Every call except [`WorkflowApi::authenticate`] requires an authenticated
/// [`Session`] and fails with [`N8nError::NotAuthenticated`] before touching
/// the network otherwise.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Log in and store the session token in `session`.
    async fn authenticate(
        &self,
        session: &mut Session,
        credentials: &Credentials,
    ) -> Result<String, N8nError>;

    /// Fetch a workflow definition, unmodified.
    async fn fetch_workflow(
        &self,
        session: &Session,
        workflow_id: &str,
    ) -> Result<WorkflowDefinition, N8nError>;

    /// Submit a manual run of the workflow and return the execution id.
    async fn start_execution(
        &self,
        session: &Session,
        workflow_id: &str,
        params: &ExecutionParams,
    ) -> Result<String, N8nError>;

    /// Read the execution status once.
    async fn poll_status(
        &self,
        session: &Session,
        execution_id: &str,
    ) -> Result<ExecutionRecord, N8nError>;
}

/// REST client for the n8n internal API (`/rest`).
#[derive(Debug, Clone)]
pub struct N8nClient {
    http: HttpClient,
}

impl N8nClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[async_trait]
impl WorkflowApi for N8nClient {
    async fn authenticate(
        &self,
        session: &mut Session,
        credentials: &Credentials,
    ) -> Result<String, N8nError> {
        let url = session.url("login");
        let body = json!({
            "emailOrLdapLoginId": credentials.email,
            "password": credentials.password,
        });

        debug!(base_url = session.base_url(), email = %credentials.email, "Logging in to n8n");
        let response = self.http.post_json(&url, &body, None).await?;
        let status = response.status();
        let token = extract_auth_cookie(response.headers());
        let text = response.text().await?;

        if !status.is_success() {
            self.http.metrics().record_auth_failure();
            return Err(N8nError::Auth {
                reason: format!("login rejected with HTTP {}", status.as_u16()),
                body: Some(text),
            });
        }

        let Some(token) = token else {
            self.http.metrics().record_auth_failure();
            return Err(N8nError::Auth {
                reason: "Failed to get authentication cookie".to_string(),
                body: Some(text),
            });
        };

        let user_email = serde_json::from_str::<Value>(&text)
            .ok()
            .map(|body| normalize_envelope(body, "email"))
            .and_then(|user| user.get("email").and_then(Value::as_str).map(str::to_string));

        session.establish(token.clone(), user_email);
        info!(user = session.user_email(), "Login successful");
        Ok(token)
    }

    async fn fetch_workflow(
        &self,
        session: &Session,
        workflow_id: &str,
    ) -> Result<WorkflowDefinition, N8nError> {
        let cookie = session.cookie_header()?;
        let url = session.url(&format!("workflows/{workflow_id}"));

        let response = self.http.get(&url, Some(&cookie)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(N8nError::NotFound {
                workflow_id: workflow_id.to_string(),
            });
        }

        let body = read_json(response, &url).await?;
        let workflow = WorkflowDefinition::new(normalize_envelope(body, "nodes"));
        debug!(
            workflow_id,
            name = workflow.name(),
            nodes = workflow.node_count(),
            "Fetched workflow definition"
        );
        Ok(workflow)
    }

    async fn start_execution(
        &self,
        session: &Session,
        workflow_id: &str,
        params: &ExecutionParams,
    ) -> Result<String, N8nError> {
        let cookie = session.cookie_header()?;
        let workflow = self.fetch_workflow(session, workflow_id).await?;
        let request = ExecutionRequest::new(&workflow, params);
        let url = session.url(&format!("workflows/{workflow_id}/run"));

        debug!(
            workflow_id,
            start_nodes = ?params.start_nodes,
            destination_node = %params.destination_node,
            "Submitting workflow execution"
        );

        let response = self.http.post_json(&url, &request, Some(&cookie)).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(
                workflow_id,
                status = status.as_u16(),
                body = %text,
                "Workflow execution request rejected"
            );
            return Err(N8nError::Execution {
                status: status.as_u16(),
                payload: text,
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| N8nError::InvalidResponse(format!("{url}: {e}")))?;
        let payload = normalize_envelope(body, "executionId");
        let execution_id = id_field(&payload, "executionId").ok_or_else(|| {
            N8nError::InvalidResponse(format!("no executionId in run response: {text}"))
        })?;

        info!(workflow_id, execution_id = %execution_id, "Workflow execution started");
        Ok(execution_id)
    }

    async fn poll_status(
        &self,
        session: &Session,
        execution_id: &str,
    ) -> Result<ExecutionRecord, N8nError> {
        let cookie = session.cookie_header()?;
        let url = session.url(&format!("executions/{execution_id}"));
        info!(execution_id, "Checking execution status");

        let response = self.http.get(&url, Some(&cookie)).await?;
        let body = read_json(response, &url).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let pretty = serde_json::to_string_pretty(&body).unwrap_or_default();
            debug!(execution_id, response = %pretty, "Execution status response");
        }

        let record = ExecutionRecord::from_payload(execution_id, &normalize_envelope(body, "finished"));
        match record.status {
            ExecutionStatus::Success => info!(execution_id, "Workflow executed successfully"),
            ExecutionStatus::NotFinished => info!(
                execution_id,
                status = record.raw_status.as_deref(),
                "Workflow execution has not finished"
            ),
            ExecutionStatus::Failure => warn!(
                execution_id,
                status = record.raw_status.as_deref(),
                error = record.error.as_deref(),
                "Workflow execution failed"
            ),
        }
        Ok(record)
    }
}

async fn read_json(response: Response, url: &str) -> Result<Value, N8nError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(N8nError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body: text,
        });
    }
    serde_json::from_str(&text).map_err(|e| N8nError::InvalidResponse(format!("{url}: {e}")))
}
