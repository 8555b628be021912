//! Tork - containerized task worker
//!
//! This is the main entry point for the tork binary. The worker binds a
//! mailbox on the broker, runs the tasks delivered to it in a container
//! runtime, and stops on SIGINT/SIGTERM.

mod broker;
mod cli;
mod config;
mod error;
mod logging;
mod protocol;
mod runtime;
mod scheduler;
mod system;
mod types;
mod version;
mod worker;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::broker::InMemoryBroker;
use crate::cli::{Cli, Commands, ConfigSubcommand};
use crate::config::TorkConfig;
use crate::error::{Error, Result};
use crate::logging::LogGuards;
use crate::scheduler::{submit_messages, RoundRobinScheduler};
use crate::system::SysinfoStats;
use crate::worker::{generate_worker_name, Worker};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => handle_config_command(subcommand),
        Commands::Run { config, submit } => {
            let config = TorkConfig::load(config.as_deref())?;

            // The guards must be kept alive for the lifetime of the program
            let _log_guards = init_logging_from_config(&config, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting Tork worker"
            );

            run_worker(config, submit)
        }
    }
}

/// Initialize logging from configuration
fn init_logging_from_config(config: &TorkConfig, verbose: u8, quiet: bool) -> Result<LogGuards> {
    logging::init_logging(&config.logging, verbose, quiet)
}

/// Run the worker until it is told to stop
fn run_worker(config: TorkConfig, submit: Option<String>) -> Result<()> {
    // Read the batch up front so a bad path fails before anything starts
    let batch = submit
        .map(|path| {
            let path = PathBuf::from(path);
            fs::read_to_string(&path).map_err(|e| Error::IoRead { path, source: e })
        })
        .transpose()?;

    let name = config
        .worker
        .name
        .clone()
        .unwrap_or_else(generate_worker_name);

    info!(
        worker = %name,
        tags = ?config.worker.tags,
        host = %system::host_name(),
        cpus = system::cpu_count(),
        runtime = %config.runtime.kind,
        mailbox_capacity = config.broker.mailbox_capacity,
        "Configuration loaded"
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tork-worker")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(async move {
        let broker = Arc::new(InMemoryBroker::with_capacity(config.broker.mailbox_capacity));
        let runtime = runtime::create_runtime(&config.runtime);

        let worker = Worker::new(name.clone(), broker.clone(), runtime).with_stats(
            Arc::new(SysinfoStats::new()),
            Duration::from_secs(config.stats.interval_secs),
        );

        if let Some(batch) = batch {
            let scheduler = RoundRobinScheduler::new(broker.clone(), vec![name.clone()]);
            let broker = broker.clone();
            let name = name.clone();
            // Mailboxes hold messages until bound, so this may run before the worker binds
            tokio::spawn(async move {
                submit_messages(&batch, &scheduler, broker.as_ref(), &name).await;
            });
        }

        let result = worker.start().await;
        broker.shutdown();

        if result.is_ok() {
            info!(worker = %name, "Shutdown complete");
        }
        result
    })
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = TorkConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            TorkConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
