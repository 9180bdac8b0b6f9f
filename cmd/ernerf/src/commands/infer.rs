//! Inference command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use ernerf::{ErNerf, ProcessRenderer};
use ernerf_nerf::{MergeOutcome, ParameterStore};

use super::{get_config, output_result};
use crate::Cli;

/// Render a talking-head video from audio.
///
/// Frames are drawn by the external renderer configured in
/// `renderer_command`. Without an audio file, demo mode renders the
/// feature file configured in `aud`.
#[derive(Args)]
pub struct InferCommand {
    /// Audio file (WAV)
    audio: Option<PathBuf>,

    /// Allow running without audio, rendering the configured demo features
    #[arg(long)]
    demo: bool,

    /// Override the device (auto, cpu, cuda, cuda:N)
    #[arg(long)]
    device: Option<String>,
}

#[derive(Serialize)]
struct InferResult {
    video: PathBuf,
    device: String,
    elapsed_ms: u128,
    frozen: Vec<String>,
}

impl InferCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut options = get_config(cli)?.options;
        if self.demo {
            options.demo_mode = true;
        }
        if let Some(device) = &self.device {
            options.device = device.clone();
        }

        let renderer =
            ProcessRenderer::new(ParameterStore::new(), options.renderer_command.clone())?;
        let driver = ErNerf::new(options, renderer)?;
        tracing::debug!(device = %driver.device(), "driver ready");

        let frozen = match driver.merge_outcome() {
            MergeOutcome::Merged(report) => report.frozen_names().map(str::to_string).collect(),
            MergeOutcome::Skipped => Vec::new(),
        };

        let result = driver.inference(self.audio.as_deref())?;
        output_result(
            cli,
            &InferResult {
                video: result.video,
                device: driver.device().to_string(),
                elapsed_ms: result.elapsed.as_millis(),
                frozen,
            },
        )
    }
}
