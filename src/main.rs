use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use n8n_workflow_test::{init_telemetry, N8nConfig, WorkflowTestRunner};

#[derive(Parser)]
#[command(name = "n8n-workflow-test")]
#[command(version)]
#[command(about = "Run an n8n workflow once and report whether it succeeded")]
#[command(long_about = "Logs in to an n8n instance, starts a manual run of the given workflow, \
                       waits briefly, reads the execution status once and exits 0 on success. \
                       Connection settings come from N8N_* environment variables or a .env file.")]
struct Cli {
    /// ID of the workflow to test
    workflow_id: String,

    /// Configuration file (defaults to n8n-workflow-test.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds to wait before reading the execution status
    #[arg(long, value_name = "SECS")]
    poll_delay: Option<u64>,

    /// Node the run starts from (repeatable)
    #[arg(long = "start-node", value_name = "NAME")]
    start_nodes: Vec<String>,

    /// Node the run executes up to
    #[arg(long, value_name = "NAME")]
    destination_node: Option<String>,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                return Ok(());
            }
            _ => {
                print!("{}", err.render());
                process::exit(1);
            }
        },
    };

    let env_file_loaded = match N8nConfig::load_env_file() {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("Warning: could not read .env file: {err}");
            false
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            println!("Configuration error: {err:#}");
            process::exit(1);
        }
    };

    init_telemetry(&config.log_level, config.log_format)?;
    if env_file_loaded {
        tracing::info!("Loaded environment variables from .env file");
    }

    let runner = match WorkflowTestRunner::from_config(&config) {
        Ok(runner) => runner,
        Err(err) => {
            println!("{err}");
            println!("\nWorkflow test failed!");
            process::exit(1);
        }
    };

    let outcome = tokio::runtime::Runtime::new()?.block_on(async {
        runner.run(&cli.workflow_id).await
    });
    runner.api().http().metrics().log_stats();

    for line in &outcome.diagnostics {
        println!("\n{line}");
    }

    if !outcome.passed {
        println!("\nWorkflow test failed!");
        process::exit(1);
    }

    println!("\nWorkflow test completed successfully!");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<N8nConfig> {
    let mut config = N8nConfig::load(cli.config.as_deref())?;

    if let Some(delay) = cli.poll_delay {
        config.poll_delay_secs = delay;
    }
    if !cli.start_nodes.is_empty() {
        config.start_nodes = cli.start_nodes.clone();
    }
    if let Some(node) = &cli.destination_node {
        config.destination_node = node.clone();
    }

    Ok(config)
}
