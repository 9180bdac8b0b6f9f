//! CLI commands module.

mod config;
mod extract;
mod infer;

pub use config::ConfigCommand;
pub use extract::ExtractCommand;
pub use infer::InferCommand;

use ernerf_cli::{load_config, Config, Output, OutputFormat};

use crate::Cli;

const APP_NAME: &str = "ernerf";

pub(crate) fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(APP_NAME, cli.config.as_deref())
}

pub(crate) fn output_result<T: serde::Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    Output::new(OutputFormat::from_json_flag(cli.json), cli.result.clone()).write(value)
}
