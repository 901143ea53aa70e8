use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::LogFormat;

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Standard output stays
/// reserved for the harness report.
pub fn init_telemetry(default_level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    tracing::debug!(?format, "Telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the log lines of one test run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create the span wrapping a single workflow test run
pub fn create_run_span(workflow_id: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow_test",
        workflow.id = workflow_id,
        correlation.id = correlation_id,
        execution.id = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = generate_correlation_id();
        let b = generate_correlation_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
