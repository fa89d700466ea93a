#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// crates/warden-cli/src/main.rs
// ============================================================================
// Module: Warden CLI Entry Point
// Description: Command dispatcher for the Warden gateway.
// Purpose: Serve the gateway and validate configuration from the shell.
// Dependencies: clap, warden-config, warden-gateway, tokio
// ============================================================================

//! ## Overview
//! The `warden` binary starts the policy enforcement gateway or checks a
//! configuration file. Exit codes are stable: 0 for a normal shutdown, 2
//! for a configuration error, 3 for an unrecoverable startup failure, and
//! 130 when an external signal terminates the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use warden_config::ConfigError;
use warden_config::WardenConfig;
use warden_gateway::GatewayApp;
use warden_gateway::GatewayError;

// ============================================================================
// SECTION: Exit Codes
// ============================================================================

/// Exit code for configuration errors.
const EXIT_CONFIG: u8 = 2;
/// Exit code for unrecoverable startup failures.
const EXIT_STARTUP: u8 = 3;
/// Exit code for external termination.
const EXIT_SIGNAL: u8 = 130;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "warden", version, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Warden gateway.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected configuration subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to warden.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file and print a normalized summary.
    Check(ConfigCheckCommand),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path (defaults to warden.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command: ConfigCommand::Check(command),
        } => command_config_check(&command),
    }
}

/// Runs the gateway until shutdown or an external signal.
async fn command_serve(command: ServeCommand) -> ExitCode {
    let config = match WardenConfig::load(command.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return emit_config_error(&err),
    };
    let app = match GatewayApp::from_config(config) {
        Ok(app) => app,
        Err(GatewayError::Config(message)) => {
            emit_stderr(&format!("configuration error: {message}"));
            return ExitCode::from(EXIT_CONFIG);
        }
        Err(err) => {
            emit_stderr(&format!("startup failure: {err}"));
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    tokio::select! {
        served = app.serve() => match served {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                emit_stderr(&format!("gateway failed: {err}"));
                ExitCode::from(EXIT_STARTUP)
            }
        },
        signal = tokio::signal::ctrl_c() => {
            if signal.is_err() {
                emit_stderr("signal handler unavailable");
            }
            ExitCode::from(EXIT_SIGNAL)
        }
    }
}

/// Validates a config file and prints a normalized summary.
fn command_config_check(command: &ConfigCheckCommand) -> ExitCode {
    match WardenConfig::load(command.config.as_deref()) {
        Ok(config) => {
            let summary = serde_json::json!({
                "transport": config.server.transport,
                "upstreams": config.upstreams.iter().map(|u| u.name.clone()).collect::<Vec<_>>(),
                "judge": config.judge.backend,
                "audit": config.audit.sink,
                "policies": config.policies.default_policy,
            });
            let rendered =
                serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string());
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{rendered}");
            ExitCode::SUCCESS
        }
        Err(err) => emit_config_error(&err),
    }
}

/// Reports a configuration error on stderr.
fn emit_config_error(err: &ConfigError) -> ExitCode {
    emit_stderr(&format!("configuration error: {err}"));
    ExitCode::from(EXIT_CONFIG)
}

/// Writes one diagnostic line to stderr.
fn emit_stderr(message: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{message}");
}
