//! CLI interface for Captain
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for driving the orchestration hub.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Captain orchestration hub
///
/// Runs goals through planner, coder and critic spokes and answers one-shot
/// chat messages.
#[derive(Parser, Debug)]
#[command(name = "captain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

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
    /// Run a goal through the pipeline and print the outcome
    Run {
        /// The goal to orchestrate
        goal: String,

        /// Expected deliverable (repeatable)
        #[arg(short, long = "deliverable", value_name = "TEXT")]
        deliverables: Vec<String>,

        /// Constraint on the work (repeatable)
        #[arg(short, long = "constraint", value_name = "TEXT")]
        constraints: Vec<String>,

        /// Let builder-captain spokes take over the coder phase
        #[arg(long)]
        nested: bool,
    },

    /// Send a one-shot chat message
    Chat {
        /// The message text
        text: String,
    },

    /// Show runtime wiring diagnostics
    Diag,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["captain", "--json", "--log", "debug", "diag"]);
        assert!(cli.json);
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Diag));
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from([
            "captain",
            "run",
            "write a haiku",
            "--deliverable",
            "poem",
            "-c",
            "short",
            "--nested",
        ]);
        if let Command::Run {
            goal,
            deliverables,
            constraints,
            nested,
        } = cli.command
        {
            assert_eq!(goal, "write a haiku");
            assert_eq!(deliverables, vec!["poem"]);
            assert_eq!(constraints, vec!["short"]);
            assert!(nested);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_chat_command() {
        let cli = Cli::parse_from(["captain", "chat", "hello there"]);
        if let Command::Chat { text } = cli.command {
            assert_eq!(text, "hello there");
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["captain", "config", "show", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        if let Command::Config { action } = cli.command {
            assert!(matches!(action, ConfigAction::Show));
        } else {
            panic!("Expected Config command");
        }
    }
}
