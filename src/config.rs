use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::http::DEFAULT_BROWSER_ID;
use crate::n8n::types::{ExecutionParams, DEFAULT_DESTINATION_NODE, DEFAULT_START_NODE};
use crate::n8n::{Credentials, N8nError};

/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "n8n-workflow-test.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Main configuration structure for the workflow test harness
#[derive(Clone, Deserialize, Serialize)]
pub struct N8nConfig {
    /// n8n host name
    pub host: String,
    /// n8n port
    pub port: u16,
    /// http or https
    pub protocol: String,
    /// Account email (N8N_EMAIL)
    pub email: Option<String>,
    /// Account password (N8N_PASSWORD)
    pub password: Option<String>,
    /// Value of the browser-id header sent with every request
    pub browser_id: String,
    /// Seconds to wait between submitting the execution and polling it
    pub poll_delay_secs: u64,
    /// Optional per-request timeout
    pub request_timeout_secs: Option<u64>,
    /// Nodes the manual run starts from (comma-separated in N8N_START_NODES)
    #[serde(deserialize_with = "node_list")]
    pub start_nodes: Vec<String>,
    /// Node the manual run executes up to
    pub destination_node: String,
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for N8nConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5678,
            protocol: "http".to_string(),
            email: None,
            password: None,
            browser_id: DEFAULT_BROWSER_ID.to_string(),
            poll_delay_secs: 2,
            request_timeout_secs: None,
            start_nodes: vec![DEFAULT_START_NODE.to_string()],
            destination_node: DEFAULT_DESTINATION_NODE.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl std::fmt::Debug for N8nConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("N8nConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("browser_id", &self.browser_id)
            .field("poll_delay_secs", &self.poll_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("start_nodes", &self.start_nodes)
            .field("destination_node", &self.destination_node)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl N8nConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or n8n-workflow-test.toml if it exists)
    /// 3. Environment variables (prefixed with N8N_)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults_builder()?;

        match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                builder = builder.add_source(File::from(path));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    builder = builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)));
                }
            }
        }

        // Values stay strings so numeric-looking passwords and node names
        // survive; typed fields are parsed during deserialization.
        builder = builder.add_source(Environment::with_prefix("N8N"));

        let config = builder.build()?;
        let n8n_config: N8nConfig = config
            .try_deserialize()
            .context("Failed to parse n8n configuration")?;
        n8n_config.validate()?;
        Ok(n8n_config)
    }

    fn defaults_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("protocol", defaults.protocol)?
            .set_default("browser_id", defaults.browser_id)?
            .set_default("poll_delay_secs", defaults.poll_delay_secs)?
            .set_default("start_nodes", defaults.start_nodes)?
            .set_default("destination_node", defaults.destination_node)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "pretty")?;
        Ok(builder)
    }

    /// Load .env file if it exists. Returns whether one was read.
    pub fn load_env_file() -> Result<bool> {
        if !Path::new(".env").exists() {
            return Ok(false);
        }
        dotenvy::dotenv()?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.protocol.as_str(), "http" | "https") {
            anyhow::bail!("Unsupported protocol '{}': expected http or https", self.protocol);
        }
        if self.host.trim().is_empty() {
            anyhow::bail!("N8N_HOST must not be empty");
        }
        if self.start_nodes.is_empty() {
            anyhow::bail!("At least one start node is required");
        }
        Ok(())
    }

    /// Base URL of the REST API, e.g. `http://localhost:5678/rest`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/rest", self.protocol, self.host, self.port)
    }

    pub fn credentials(&self) -> Result<Credentials, N8nError> {
        Credentials::from_parts(self.email.as_deref(), self.password.as_deref())
    }

    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams {
            start_nodes: self.start_nodes.clone(),
            destination_node: self.destination_node.clone(),
        }
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeList {
    List(Vec<String>),
    Joined(String),
}

fn node_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let nodes = match NodeList::deserialize(deserializer)? {
        NodeList::List(nodes) => nodes,
        NodeList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(nodes
        .into_iter()
        .map(|node| node.trim().to_string())
        .filter(|node| !node.is_empty())
        .collect())
}
