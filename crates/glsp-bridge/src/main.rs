//! glsp-bridge - connects a host editor with GLSP diagram webviews and a
//! GLSP server.
//!
//! The host editor speaks newline-delimited JSON-RPC on stdin/stdout, so
//! logs never go to stdout.

mod runner;

use clap::Parser;
use glsp_bridge_core::config::{Config, LogLevel, ServerConfig};
use runner::RunnerConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Crates whose log level follows `--verbose` and `logLevel`.
const LOG_TARGETS: &[&str] = &[
    "glsp_bridge",
    "glsp_bridge_core",
    "glsp_bridge_server",
    "glsp_bridge_host",
    "glsp_server",
];

#[derive(Parser, Debug)]
#[command(name = "glsp-bridge")]
#[command(author, version, about = "Bridge between a host editor and a GLSP diagram server", long_about = None)]
struct Cli {
    /// Project directory to load glsp-bridge.json(c) from
    #[arg(long, value_name = "DIR")]
    config: Option<PathBuf>,

    /// GLSP server jar to launch
    #[arg(long, value_name = "PATH")]
    jar: Option<PathBuf>,

    /// Port of the GLSP server
    #[arg(long)]
    port: Option<u16>,

    /// Diagram type served by the GLSP server
    #[arg(long)]
    diagram_type: Option<String>,

    /// Connect to an already running server instead of launching one
    #[arg(long)]
    no_launch: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,
}

impl Cli {
    /// Command line settings as the highest-priority config layer.
    fn overrides(&self) -> Config {
        let server = ServerConfig {
            jar_path: self.jar.clone(),
            port: self.port,
            launch: self.no_launch.then_some(false),
            ..Default::default()
        };

        Config {
            diagram_type: self.diagram_type.clone(),
            log_level: self.verbose.then_some(LogLevel::Debug),
            server: (server != ServerConfig::default()).then_some(server),
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    build_runtime()?.block_on(start(cli))
}

/// Routing runs on one thread; see `glsp_bridge_core::router`.
fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

async fn start(cli: Cli) -> anyhow::Result<()> {
    let project_dir = match &cli.config {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let (config, sources) = Config::load(Some(project_dir.as_path())).await?;
    let config = config.merge(cli.overrides());

    let level = config.log_level.unwrap_or(LogLevel::Info);
    let log_file = init_logging(level, cli.log_stderr);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        sources = ?sources,
        "Starting glsp-bridge"
    );

    let result = match RunnerConfig::from_config(&config) {
        Ok(runner_config) => runner::run(runner_config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "glsp-bridge failed");
        if let Some(path) = log_file {
            eprintln!("Logs: {}", path.display());
        }
    }

    result
}

/// Build the log filter for `level`. `RUST_LOG` takes precedence.
fn log_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str()))
            .collect();
        EnvFilter::new(directives.join(","))
    })
}

/// Initialize logging to stderr or to a file in the standard log directory.
/// Returns the log file path if logging to file.
fn init_logging(level: LogLevel, stderr: bool) -> Option<PathBuf> {
    if stderr {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(level))
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let log_dir = get_log_dir();

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return None;
    }

    let log_file = log_dir.join("glsp-bridge.log");

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            return None;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .with_ansi(false)
        .with_writer(file)
        .init();

    Some(log_file)
}

/// Get the log directory path.
fn get_log_dir() -> PathBuf {
    // macOS: ~/Library/Logs/glsp-bridge
    // Linux: ~/.local/state/glsp-bridge/logs
    // Windows: %LOCALAPPDATA%/glsp-bridge/logs

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/glsp-bridge");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return state_dir.join("glsp-bridge/logs");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local/state/glsp-bridge/logs");
        }
    }

    dirs::data_local_dir()
        .map(|d| d.join("glsp-bridge/logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("glsp-bridge-logs"))
}
