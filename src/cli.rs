//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the Tork worker.

use clap::{Parser, Subcommand};

/// Tork - containerized task worker
///
/// Binds a mailbox on the message broker, starts and cancels the tasks
/// delivered to it inside a container runtime, and samples host stats
/// until interrupted.
#[derive(Parser, Debug)]
#[command(name = "tork")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker until SIGINT or SIGTERM
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "TORK_CONFIG")]
        config: Option<String>,

        /// JSON-lines file of task/cancel messages to submit once the worker is ready
        #[arg(short, long)]
        submit: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
