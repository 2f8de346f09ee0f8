//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mentemappa_core::config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

/// Environment variable holding the log filter (e.g. `debug`, `mentemappa_core=trace`).
const LOG_ENV: &str = "MENTEMAPPA_LOG";
const LOG_FILE_NAME: &str = "mentemappa.log";

#[derive(Parser)]
#[command(name = "mentemappa")]
#[command(version)]
#[command(about = "Chat with Gemini and turn the answers into mind maps")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the model from config
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Directory for exported files (default: [export].out_dir from config)
    #[arg(long, value_name = "DIR", global = true)]
    out_dir: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generates one mind map from a prompt and prints its outline
    Exec {
        /// The prompt describing the map
        #[arg(short, long)]
        prompt: String,

        /// Comma-separated export formats (md, svg, png)
        #[arg(long, value_name = "FORMATS", value_delimiter = ',')]
        export: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    let result = rt.block_on(async move { dispatch(cli).await });
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "command failed");
    }
    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    let Cli {
        command,
        model,
        out_dir,
    } = cli;

    if let Some(model) = model {
        config.model = model;
    }
    if let Some(out_dir) = out_dir {
        config.export.out_dir = out_dir;
    }

    // default to chat mode
    let Some(command) = command else {
        return commands::chat::run(&config).await;
    };

    match command {
        Commands::Exec { prompt, export } => {
            commands::exec::run(commands::exec::ExecRunOptions {
                prompt: &prompt,
                config: &config,
                export: &export,
            })
            .await
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}

/// Installs the file logger under `$MENTEMAPPA_HOME/logs`.
///
/// Logging goes to a file so stdout stays reserved for the chat and the
/// printed outline. Returns `None` (logging disabled) if the directory
/// cannot be created.
fn init_tracing() -> Option<WorkerGuard> {
    let logs_dir = config::paths::logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        return None;
    }

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let appender = tracing_appender::rolling::never(&logs_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter)
        .try_init()
        .ok()?;

    Some(guard)
}
