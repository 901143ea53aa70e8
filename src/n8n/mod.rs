pub mod client;
pub mod errors;
pub mod session;
pub mod types;

pub use client::{N8nClient, WorkflowApi};
pub use errors::N8nError;
pub use session::{Credentials, Session, AUTH_COOKIE};
pub use types::{ExecutionParams, ExecutionRecord, ExecutionStatus, WorkflowDefinition};
