//! Options file commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use ernerf::Options;
use ernerf_cli::{print_success, save_config, Paths};

use super::{get_config, output_result, APP_NAME};
use crate::Cli;

/// Manage the options file.
///
/// Options are stored in ~/.ernerf/ernerf/config.yaml unless --config
/// points elsewhere. A `.json` path is read and written as JSON.
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print the effective options
    Show,
    /// Print the options file path
    Path,
    /// Check the options for consistency
    Validate,
    /// Write default options
    Init {
        /// Replace an existing options file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Show => {
                let cfg = get_config(cli)?;
                output_result(cli, &cfg.options)
            }
            ConfigSubcommand::Path => {
                let cfg = get_config(cli)?;
                println!("{}", cfg.path().display());
                Ok(())
            }
            ConfigSubcommand::Validate => {
                let cfg = get_config(cli)?;
                cfg.options.validate()?;
                print_success(&format!("{} is valid", cfg.path().display()));
                Ok(())
            }
            ConfigSubcommand::Init { force } => {
                let paths = Paths::new(APP_NAME)?;
                let path = cli
                    .config
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| paths.config_file());
                if path.exists() && !force {
                    anyhow::bail!("{} already exists, use --force to replace it", path.display());
                }

                paths.ensure_dirs()?;
                let output_dir = paths.output_dir().to_string_lossy().into_owned();
                let options = Options {
                    save_path: output_dir.clone(),
                    feature_dir: output_dir,
                    model_cache_dir: paths.model_cache_dir().to_string_lossy().into_owned(),
                    ..Options::default()
                };
                save_config(APP_NAME, &options, Some(&path.to_string_lossy()))?;
                print_success(&format!("Default options written to {}", path.display()));
                Ok(())
            }
        }
    }
}
