pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use boardsight_core::config::{AppConfig, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::GlobalOptions;

#[derive(Debug, Parser)]
#[command(
    name = "boardsight",
    about = "Boardsight pipeline and work-order insight CLI",
    long_about = "Refresh monday.com deal and work-order boards, audit their data quality, and answer business questions from the normalized snapshot.",
    after_help = "Examples:\n  boardsight --demo ask \"how is the pipeline looking?\"\n  boardsight refresh --json\n  boardsight doctor --json\n  boardsight config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Serve the built-in demo boards instead of monday.com")]
    demo: bool,
    #[arg(long, global = true, value_name = "PATH", help = "Read configuration from PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Refresh the boards and answer a business question")]
    Ask {
        question: String,
        #[arg(long, help = "Emit the full response as JSON")]
        json: bool,
    },
    #[command(about = "Fetch, normalize, and audit both boards and report data quality")]
    Refresh {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate config, rule tables, source reachability, and LLM readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions { demo: cli.demo, config_path: cli.config };

    // Commands report config failures themselves; logging falls back to defaults.
    let logging = AppConfig::load(options.load_options())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging.level, logging.format);

    let result = match cli.command {
        Command::Ask { question, json } => commands::ask::run(&options, &question, json),
        Command::Refresh { json } => commands::refresh::run(&options, json),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Config => commands::config::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command output on stdout stays parseable.
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
