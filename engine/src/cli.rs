//! CLI interface for Parley
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines the example front ends and the global flags they share.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley conversation engine
///
/// Drives conversations between an NLU service and an application, fed from
/// the terminal or from a direct-message feed.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chat with the weather example from the terminal
    Interactive {
        /// NLU server access token
        #[arg(long, env = "PARLEY_NLU_TOKEN", hide_env_values = true)]
        token: String,

        /// Log raw HTTP requests and responses
        #[arg(long)]
        debug: bool,
    },

    /// Answer direct messages from the feed
    Feed {
        /// Path to the five-line credentials file
        #[arg(long, value_name = "PATH")]
        credentials: PathBuf,

        /// Message id to resume after (-1 starts from the newest message)
        #[arg(long, value_name = "ID", default_value_t = -1, allow_negative_numbers = true)]
        processed_to: i64,

        /// Log raw HTTP requests and responses
        #[arg(long)]
        debug: bool,
    },

    /// Extract meaning from a single message and print the raw response
    Message {
        /// NLU server access token
        #[arg(long, env = "PARLEY_NLU_TOKEN", hide_env_values = true)]
        token: String,

        /// Text to analyse
        text: String,

        /// Log raw HTTP requests and responses
        #[arg(long)]
        debug: bool,
    },
}
