//! blade: command-line client for Blade signaling sessions.
//!
//! Connects to a relay, authenticates with project/token credentials, and
//! either streams server events or performs a single `blade.execute` call.

mod commands;
mod config;

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use blade_client::SessionOptions;

/// Blade signaling client
#[derive(Parser)]
#[command(name = "blade", version = "0.1.0", about = "Blade signaling client")]
struct Cli {
    /// Relay host (default: wss://relay.signalwire.com)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Project identifier
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Authentication token
    #[arg(short, long, global = true, env = "BLADE_TOKEN")]
    token: Option<String>,

    /// Seconds to wait for each reply
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print server events as JSON lines until interrupted
    Listen,

    /// Execute one method on the negotiated protocol and print the result
    Call {
        /// Method name, e.g. calling.dial
        method: String,
        /// Method parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
}

impl Cli {
    /// Merge flags over config file values.
    fn session_options(&self, cfg: &config::Config) -> SessionOptions {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        SessionOptions {
            project: self.project.clone().or_else(|| non_empty(&cfg.default.project)),
            token: self.token.clone().unwrap_or_else(|| cfg.default.token.clone()),
            host: self.host.clone().or_else(|| non_empty(&cfg.default.host)),
            auto_connect: false,
            execute_timeout: Duration::from_secs(self.timeout.unwrap_or(cfg.default.timeout_secs)),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr so stdout stays pure JSON.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("blade=debug,blade_cli=debug,blade_client=debug,blade_core=debug")
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("blade=warn,blade_cli=warn,blade_client=warn")
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    // Load config file.
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("blade: {e:#}");
            std::process::exit(1);
        }
    };
    let options = cli.session_options(&cfg);

    if options.token.is_empty() {
        eprintln!("blade: no token given (use --token, BLADE_TOKEN, or the config file)");
        std::process::exit(1);
    }

    let result = match &cli.command {
        Command::Listen => commands::listen::run(options).await,
        Command::Call { method, params } => {
            commands::call::run(options, method, params.as_deref()).await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("blade: {e:#}");
        std::process::exit(1);
    }
}
