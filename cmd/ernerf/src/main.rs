//! ernerf CLI - audio-driven talking-head inference from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, ExtractCommand, InferCommand};

/// ernerf CLI - audio-driven talking-head inference.
///
/// This tool wraps the inference pipeline:
///   - Acoustic feature extraction (audio -> .npy)
///   - Video rendering from audio through an external renderer
///   - Options file management
///
/// Options are stored in ~/.ernerf/ernerf/config.yaml.
#[derive(Parser)]
#[command(name = "ernerf")]
#[command(about = "ER-NeRF inference CLI tool")]
#[command(version)]
pub struct Cli {
    /// Options file (default is ~/.ernerf/ernerf/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output file for the command result (default: stdout)
    #[arg(long = "result", global = true)]
    pub result: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the options file
    Config(ConfigCommand),
    /// Extract acoustic features from an audio file
    Extract(ExtractCommand),
    /// Render a talking-head video from audio
    Infer(InferCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli),
        Commands::Extract(cmd) => cmd.run(&cli),
        Commands::Infer(cmd) => cmd.run(&cli),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_infer_with_globals() {
        let cli = Cli::try_parse_from(["ernerf", "infer", "speech.wav", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Infer(_)));
    }

    #[test]
    fn infer_audio_is_optional() {
        let cli = Cli::try_parse_from(["ernerf", "--config", "opts.yaml", "infer"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("opts.yaml"));
    }
}
