//! # Queue Lifecycle CLI
//!
//! Command-line interface for running queue lifecycle scenarios.
//!
//! This module provides CLI commands for:
//! - Listing the scenario catalogue
//! - Running one scenario, with its prerequisites, or the whole catalogue
//! - Deleting every scenario queue after a successful run
//! - Showing the resolved configuration
//!
//! Every command runs against the in-memory broker, configured through the
//! `broker` section of the configuration.

use clap::{CommandFactory, Parser, Subcommand};
use queue_lifecycle::{
    delete_all_scenario_queues, run_scenario, InMemoryBrokerConfig, InMemoryServiceBus,
    LifecycleSettings, QueueError, QueueLifecycleController, RetryPolicy, ScenarioKind,
    ScenarioOptions, ScenarioReport,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Binary name used in help output and shell completions
pub const BINARY_NAME: &str = "queue-lifecycle";

/// Prefix for configuration environment variables, e.g. `SBL__SCENARIO__MESSAGE_COUNT`
pub const ENV_PREFIX: &str = "SBL";

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue Lifecycle CLI - provisioning and message-lifecycle scenarios
#[derive(Debug, Parser)]
#[command(name = "queue-lifecycle")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run message lifecycle scenarios against a queue broker")]
#[command(
    long_about = "Provisions queues, sends, peeks, receives, defers, dead-letters and completes messages, printing the queue state after each step"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SBL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level; overrides the configured level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the scenario catalogue
    List,

    /// Run one scenario after the scenarios it depends on
    Run {
        /// Scenario name, as shown by `list`
        scenario: String,

        /// Number of messages to send; defaults to `scenario.message_count`
        #[arg(short, long)]
        message_count: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Delete every scenario queue once the run succeeds
        #[arg(long)]
        delete_after: bool,
    },

    /// Run the whole catalogue in order against one broker
    RunAll {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Delete every scenario queue once the run succeeds
        #[arg(long)]
        delete_after: bool,
    },

    /// Show the resolved configuration
    Config {
        /// Output format for configuration
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Queue(_) => 2,
            Self::InvalidArgument { .. } => 3,
            Self::Io(_) | Self::Serialization(_) => 4,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// CLI configuration structure
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Bound on queue creation attempts
    pub provisioning: RetrySettings,

    /// Bound on reads while a new queue becomes readable
    pub readiness: RetrySettings,

    /// Scenario run settings
    pub scenario: ScenarioSettings,

    /// In-memory broker behaviour
    pub broker: InMemoryBrokerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Reject values no scenario can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provisioning.validate("provisioning")?;
        self.readiness.validate("readiness")?;

        if self.scenario.message_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scenario.message_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.broker.max_batch_size_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "broker.max_batch_size_bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!("unknown level '{}'", self.logging.level),
            });
        }

        Ok(())
    }

    /// Retry bounds handed to the controller
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            provisioning: self.provisioning.to_policy(),
            readiness: self.readiness.to_policy(),
        }
    }

    pub fn scenario_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            expiry_wait_factor: self.scenario.expiry_wait_factor,
        }
    }
}

/// Fixed-delay retry bound
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay_seconds: 2,
        }
    }
}

impl RetrySettings {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{}.max_attempts", section),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_secs(self.delay_seconds))
    }
}

/// Scenario run settings
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Multiple of the message TTL to wait before inspecting expired messages
    pub expiry_wait_factor: u32,

    /// Messages sent by `run` and `run-all` unless overridden
    pub message_count: usize,

    /// Run on a paused clock that jumps over every wait
    pub simulated_clock: bool,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            expiry_wait_factor: queue_lifecycle::scenario::DEFAULT_EXPIRY_WAIT_FACTOR,
            message_count: queue_lifecycle::scenario::DEFAULT_MESSAGE_COUNT,
            simulated_clock: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum LogFormat {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_configuration(cli.config.as_deref())?;

    // Initialize logging
    initialize_logging(&cli, &config.logging)?;
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Configuration loaded from explicit path");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        if config.scenario.simulated_clock {
            tokio::time::pause();
        }

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        execute(cli.command, &config, &mut out).await
    })
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over everything, then `--log-level`, then `logging.level`.
pub fn initialize_logging(cli: &Cli, logging: &LoggingConfig) -> Result<(), CliError> {
    let level = log_level(cli, logging)?.as_str().to_ascii_lowercase();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("queue_lifecycle={level},queue_lifecycle_cli={level}").into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs || logging.format == LogFormat::Json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| {
        CliError::Configuration(ConfigError::Logging {
            message: e.to_string(),
        })
    })
}

/// Level for the default filter; `--log-level` must name a tracing level
pub fn log_level(cli: &Cli, logging: &LoggingConfig) -> Result<tracing::Level, CliError> {
    match cli.log_level.as_deref() {
        Some(level) => level.parse().map_err(|_| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: format!(
                "unknown level '{}', expected one of trace, debug, info, warn, error",
                level
            ),
        }),
        None => logging.level.parse().map_err(|_| {
            CliError::Configuration(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!("unknown level '{}'", logging.level),
            })
        }),
    }
}

/// Load configuration from defaults, files and the environment.
///
/// Sources, later ones overriding earlier ones:
///  1. Built-in defaults
///  2. `config/queue-lifecycle.{yaml,toml,json}` if present
///  3. The explicit path, which must exist
///  4. `SBL__` environment variables, e.g. `SBL__READINESS__MAX_ATTEMPTS=5`
pub fn load_configuration(config_path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("config/queue-lifecycle").required(false));

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config: CliConfig = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

/// Run one command, writing its output to `out`
pub async fn execute<W: Write>(
    command: Commands,
    config: &CliConfig,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Commands::List => execute_list_command(out),
        Commands::Run {
            scenario,
            message_count,
            format,
            delete_after,
        } => {
            execute_run_command(&scenario, message_count, format, delete_after, config, out).await
        }
        Commands::RunAll {
            format,
            delete_after,
        } => execute_run_all_command(format, delete_after, config, out).await,
        Commands::Config { format } => execute_config_command(format, config, out),
        Commands::Completions { shell } => execute_completions_command(shell, out),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn build_controller(config: &CliConfig) -> QueueLifecycleController {
    let bus = InMemoryServiceBus::new(config.broker.clone());
    QueueLifecycleController::new(
        Arc::new(bus.clone()),
        Arc::new(bus),
        config.lifecycle_settings(),
    )
}

/// Run scenarios in order, stopping at the first failure.
///
/// With `delete_after`, a successful run ends by deleting every scenario queue
/// on the same broker. The controller is closed on both paths.
async fn run_plan<W: Write>(
    plan: &[ScenarioKind],
    message_count: usize,
    format: OutputFormat,
    delete_after: bool,
    config: &CliConfig,
    out: &mut W,
) -> Result<(), CliError> {
    let controller = build_controller(config);
    let options = config.scenario_options();

    let mut reports = Vec::with_capacity(plan.len());
    let mut outcome = Ok(());
    for kind in plan {
        info!(scenario = %kind, "Running scenario");
        let result = match kind.config(message_count) {
            Ok(scenario) => run_scenario(&controller, &scenario, &options).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                if format == OutputFormat::Text {
                    writeln!(out, "{}", report)?;
                }
                reports.push(report);
            }
            Err(e) => {
                error!(scenario = %kind, error = %e, "Scenario failed");
                outcome = Err(CliError::Queue(e));
                break;
            }
        }
    }

    if delete_after && outcome.is_ok() {
        outcome = delete_scenario_queues(&controller, format, out).await;
    }

    controller.close().await?;
    outcome?;

    if format == OutputFormat::Json {
        write_json_reports(&reports, out)?;
    }
    Ok(())
}

fn write_json_reports<W: Write>(reports: &[ScenarioReport], out: &mut W) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, reports)?;
    writeln!(out)?;
    Ok(())
}

async fn delete_scenario_queues<W: Write>(
    controller: &QueueLifecycleController,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let deleted = delete_all_scenario_queues(controller).await?;
    if format == OutputFormat::Text {
        if deleted.is_empty() {
            writeln!(out, "No scenario queues present")?;
        }
        for name in deleted {
            writeln!(out, "Deleted queue '{}'", name)?;
        }
    }
    Ok(())
}

fn execute_list_command<W: Write>(out: &mut W) -> Result<(), CliError> {
    for kind in ScenarioKind::ALL {
        writeln!(out, "{:<40} {}", kind.name(), kind.description())?;
        let prerequisites = kind.prerequisites();
        if !prerequisites.is_empty() {
            let names: Vec<&str> = prerequisites.iter().map(|k| k.name()).collect();
            writeln!(out, "{:<40}   runs after: {}", "", names.join(", "))?;
        }
    }
    Ok(())
}

async fn execute_run_command<W: Write>(
    scenario: &str,
    message_count: Option<usize>,
    format: OutputFormat,
    delete_after: bool,
    config: &CliConfig,
    out: &mut W,
) -> Result<(), CliError> {
    let kind: ScenarioKind = scenario.parse().map_err(|e: queue_lifecycle::ValidationError| {
        CliError::InvalidArgument {
            arg: "scenario".to_string(),
            message: e.to_string(),
        }
    })?;

    if let (Some(requested), Some(fixed)) = (message_count, kind.fixed_message_count()) {
        if requested != fixed {
            warn!(
                scenario = %kind,
                requested,
                sent = fixed,
                "Scenario sends a fixed number of messages; --message-count is ignored"
            );
        }
    }

    let message_count = message_count.unwrap_or(config.scenario.message_count);
    if message_count == 0 {
        return Err(CliError::InvalidArgument {
            arg: "message-count".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    run_plan(
        &kind.run_plan(),
        message_count,
        format,
        delete_after,
        config,
        out,
    )
    .await
}

async fn execute_run_all_command<W: Write>(
    format: OutputFormat,
    delete_after: bool,
    config: &CliConfig,
    out: &mut W,
) -> Result<(), CliError> {
    run_plan(
        &ScenarioKind::ALL,
        config.scenario.message_count,
        format,
        delete_after,
        config,
        out,
    )
    .await
}

fn execute_config_command<W: Write>(
    format: OutputFormat,
    config: &CliConfig,
    out: &mut W,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, config)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            writeln!(
                out,
                "provisioning: {} attempts, {}s apart",
                config.provisioning.max_attempts, config.provisioning.delay_seconds
            )?;
            writeln!(
                out,
                "readiness: {} attempts, {}s apart",
                config.readiness.max_attempts, config.readiness.delay_seconds
            )?;
            writeln!(
                out,
                "scenario: {} messages, expiry wait factor {}, simulated clock {}",
                config.scenario.message_count,
                config.scenario.expiry_wait_factor,
                config.scenario.simulated_clock
            )?;
            writeln!(
                out,
                "broker: max batch {} bytes, {} unavailable creates, {} provisioning reads",
                config.broker.max_batch_size_bytes,
                config.broker.unavailable_create_attempts,
                config.broker.provisioning_reads
            )?;
            writeln!(
                out,
                "logging: {} ({:?})",
                config.logging.level, config.logging.format
            )?;
        }
    }
    Ok(())
}

fn execute_completions_command<W: Write>(
    shell: clap_complete::Shell,
    out: &mut W,
) -> Result<(), CliError> {
    info!(shell = ?shell, "Generating shell completions");
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, BINARY_NAME, out);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
