//! # Service Desk Webhook CLI
//!
//! Operator tools that run without a server:
//! - `validate-config` loads and checks the service configuration
//! - `classify` runs the trigger classifier against a saved delivery
//! - `locate` shows which compiled-in handler owns a request type

use clap::{Parser, Subcommand};
use sd_webhook_api::{ConfigError, ServiceConfig};
use sd_webhook_core::{classify, HandlerLocator, RequestTypeId, TicketError, TicketView};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Structure
// ============================================================================

/// Service Desk webhook dispatcher tools
#[derive(Parser, Debug)]
#[command(name = "sd-webhook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator tools for the Service Desk webhook dispatcher")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SDW_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Logging filter, written to stderr
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate the service configuration
    ValidateConfig {
        /// Print the resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Output format for the resolved configuration
        #[arg(short, long, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Classify a saved webhook delivery
    Classify {
        /// JSON file holding the delivery body
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show which handler owns a request type
    Locate {
        /// Request type ID; omit for a ticket without one
        request_type: Option<String>,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid delivery: {0}")]
    InvalidDelivery(#[from] TicketError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rendering failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { .. } => 1,
            Self::Yaml(_) => 2,
            Self::Configuration(_) => 3,
            Self::InvalidDelivery(_) | Self::Json(_) => 4,
            Self::Io(_) => 5,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Parse arguments, run the command and print its output.
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli);

    let output = run(&cli)?;
    print!("{output}");
    Ok(())
}

/// Run a parsed command and return what it would print.
pub fn run(cli: &Cli) -> Result<String, CliError> {
    debug!(command = ?cli.command, "Running command");

    match &cli.command {
        Commands::ValidateConfig { show, format } => {
            validate_config(cli.config.as_deref(), *show, *format)
        }
        Commands::Classify { file, format } => classify_delivery(file, *format),
        Commands::Locate { request_type } => {
            locate_handler(cli.config.as_deref(), request_type.as_deref())
        }
    }
}

fn initialize_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Load, validate and optionally render the configuration.
///
/// Table entries naming a handler that is not compiled in are reported but
/// do not fail validation; such request types simply have no handler.
pub fn validate_config(
    path: Option<&Path>,
    show: bool,
    format: OutputFormat,
) -> Result<String, CliError> {
    let config = ServiceConfig::load(path)?;
    config.validate()?;

    let registry = sd_webhook_service::handlers::registry();
    let mut output = String::from("Configuration is valid\n");

    let mut table: Vec<_> = config.handlers.iter().collect();
    table.sort();
    for (request_type, handler) in table {
        if !registry.contains(handler) {
            let _ = writeln!(
                output,
                "warning: request type {request_type} maps to unregistered handler '{handler}'"
            );
        }
    }

    if show {
        output.push_str(&render(&config, format)?);
    }

    Ok(output)
}

/// Run the trigger classifier against a delivery stored in `file`.
pub fn classify_delivery(file: &Path, format: OutputFormat) -> Result<String, CliError> {
    let payload: Value = serde_json::from_slice(&std::fs::read(file)?)?;
    let decision = classify(&payload)?;
    let ticket = TicketView::from_payload(&payload)
        .ok()
        .map(|view| view.key().to_string());

    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "ticket: {}", ticket.as_deref().unwrap_or("-"));
            for (label, change) in [
                ("transition", &decision.transition),
                ("assignment", &decision.assignment),
            ] {
                match change {
                    Some(change) => {
                        let _ = writeln!(
                            output,
                            "{label}: {} -> {}",
                            change.from.as_deref().unwrap_or("-"),
                            change.to.as_deref().unwrap_or("-")
                        );
                    }
                    None => {
                        let _ = writeln!(output, "{label}: none");
                    }
                }
            }
            if decision.is_unclassified() {
                output.push_str("unclassified: generic hook candidate\n");
            }
            Ok(output)
        }
        other => render(&json!({ "ticket": ticket, "decision": decision }), other),
    }
}

/// Report the handler a request type resolves to.
pub fn locate_handler(path: Option<&Path>, request_type: Option<&str>) -> Result<String, CliError> {
    let config = ServiceConfig::load(path)?;
    let registry = Arc::new(sd_webhook_service::handlers::registry());
    let locator = HandlerLocator::new(config.handlers, registry.clone());

    let request_type = request_type.map(RequestTypeId::from);
    let label = request_type
        .as_ref()
        .map_or_else(|| "<none>".to_string(), |id| id.to_string());

    let Some(name) = locator.locate(request_type.as_ref()) else {
        return Ok(format!("No handler for request type {label}\n"));
    };

    let loaded = registry.load(&name).map_err(|e| CliError::CommandFailed {
        message: e.to_string(),
    })?;

    Ok(format!(
        "{label} -> {} {}\n",
        loaded.name(),
        loaded.capabilities()
    ))
}

fn render<T: serde::Serialize>(value: &T, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(value)?)),
        OutputFormat::Yaml | OutputFormat::Text => Ok(serde_yaml::to_string(value)?),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
