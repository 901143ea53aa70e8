// n8n workflow test harness
// Logs in to an n8n instance, runs one workflow and reports pass/fail.

pub mod config;
pub mod harness;
pub mod http;
pub mod n8n;
pub mod observability;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{LogFormat, N8nConfig};
pub use harness::{run_test, RunPhase, TestOutcome, WorkflowTestRunner};
pub use http::HttpClient;
pub use n8n::{
    Credentials, ExecutionParams, ExecutionRecord, ExecutionStatus, N8nClient, N8nError, Session,
    WorkflowApi, WorkflowDefinition,
};
pub use observability::{ApiMetrics, OperationTimer};
pub use telemetry::{create_run_span, generate_correlation_id, init_telemetry};
