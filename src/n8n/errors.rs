use thiserror::Error;

/// Errors raised by the n8n API client.
///
/// Every variant is terminal for a test run: the runner logs it and turns
/// it into a failed verdict.
#[derive(Debug, Error)]
pub enum N8nError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {reason}")]
    Auth {
        reason: String,
        body: Option<String>,
    },

    #[error("Not authenticated. Log in before calling the n8n API")]
    NotAuthenticated,

    #[error("HTTP {status} from {url}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Workflow '{workflow_id}' not found")]
    NotFound { workflow_id: String },

    #[error("Workflow execution request rejected with HTTP {status}")]
    Execution { status: u16, payload: String },

    #[error("Invalid response from n8n: {0}")]
    InvalidResponse(String),

    #[error("Request to n8n failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl N8nError {
    pub fn auth(reason: impl Into<String>) -> Self {
        N8nError::Auth {
            reason: reason.into(),
            body: None,
        }
    }

    /// Raw server payload attached to the error, if the server sent one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            N8nError::Auth { body, .. } => body.as_deref(),
            N8nError::Http { body, .. } => Some(body.as_str()),
            N8nError::Execution { payload, .. } => Some(payload.as_str()),
            _ => None,
        }
        .filter(|body| !body.trim().is_empty())
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            N8nError::Http { status, .. } | N8nError::Execution { status, .. } => Some(*status),
            N8nError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
