//! Mixdown CLI
//!
//! Command-line interface for the mixdown render pipeline.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use mixdown::cli::commands::{self, RenderOptions};
use mixdown::cli::{Cli, Commands};
use mixdown::MixdownError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Mixdown v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => {
            let name = command_name(&cmd);
            handle_command(cmd)
                .map_err(report_failure)
                .with_context(|| format!("{} failed", name))
        }
        None => {
            println!("Mixdown v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> mixdown::Result<()> {
    match cmd {
        Commands::Render {
            input,
            output,
            length,
            chunk_size,
            bit_depth,
            split_channels,
            no_broadcast,
            config,
        } => {
            let options = RenderOptions {
                length,
                chunk_size,
                bit_depth,
                split_channels,
                no_broadcast,
                config,
            };
            commands::render(&input, &output, &options).map(|_| ())
        }
        Commands::Monitor {
            port,
            count,
            timeout_ms,
        } => commands::monitor(port, count, Duration::from_millis(timeout_ms)).map(|_| ()),
        Commands::DefaultConfig { path } => commands::default_config(&path),
    }
}

fn command_name(cmd: &Commands) -> &'static str {
    match cmd {
        Commands::Render { .. } => "render",
        Commands::Monitor { .. } => "monitor",
        Commands::DefaultConfig { .. } => "default-config",
    }
}

fn report_failure(err: MixdownError) -> MixdownError {
    warn!("[{}] {}", err.error_code(), err);
    for suggestion in err.recovery_suggestions() {
        warn!("  - {}", suggestion);
    }
    err
}
