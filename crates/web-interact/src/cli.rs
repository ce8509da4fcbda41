//! CLI argument parsing
//!
//! Running with no subcommand starts the server. The subcommands cover the
//! registration workflow: print or install the desktop-client entry, check
//! an existing client config, and probe a running server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// web-interact - MCP server for browser page interaction
#[derive(Parser, Debug)]
#[command(name = "web-interact")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML settings file (defaults to the per-user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print (or install) the Claude Desktop `mcpServers` registration
    ///
    /// Without --install, prints the JSON snippet to paste into the client
    /// config by hand. With --install, merges the entry into the given
    /// client config file, preserving everything else in it.
    ClaudeConfig {
        /// MCP endpoint URL to register (defaults to the configured server's)
        #[arg(long)]
        url: Option<String>,

        /// Entry name under `mcpServers`
        #[arg(long, default_value = wi_config::registration::DEFAULT_ENTRY_NAME)]
        name: String,

        /// Merge the entry into this client config file instead of printing
        #[arg(long, value_name = "PATH")]
        install: Option<PathBuf>,
    },

    /// Validate every `mcpServers` entry in a client config file
    CheckConfig {
        /// Path to the client config file (e.g. claude_desktop_config.json)
        path: PathBuf,
    },

    /// Probe a running server's MCP endpoint
    Doctor {
        /// MCP endpoint URL to probe (defaults to the configured server's)
        #[arg(long)]
        url: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
