//! Command-line interface for voxloop
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hands-free voice conversation loop
#[derive(Parser, Debug)]
#[command(name = "voxloop", version, about = "Hands-free voice conversation loop")]
pub struct Cli {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: transcripts + status, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the conversation loop (typed input, spoken replies echoed)
    Run,

    /// Live microphone level meter with silence detection
    Meter,

    /// List available audio input devices
    Devices,

    /// Check platform capabilities and configuration
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_defaults_to_run() {
        let cli = Cli::parse_from(["voxloop"]);
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_meter_with_globals() {
        let cli = Cli::parse_from(["voxloop", "meter", "-v", "--config", "/tmp/c.toml"]);
        assert!(matches!(cli.command, Some(Commands::Meter)));
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/c.toml")));
    }

    #[test]
    fn test_device_flag() {
        let cli = Cli::parse_from(["voxloop", "--device", "pipewire"]);
        assert_eq!(cli.device.as_deref(), Some("pipewire"));
    }
}
