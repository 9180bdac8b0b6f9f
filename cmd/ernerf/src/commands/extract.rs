//! Acoustic feature extraction command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use ernerf_features::AudioExtractor;

use super::{get_config, output_result};
use crate::Cli;

/// Extract acoustic features from an audio file.
///
/// Writes a `[frames, 16, 29]` float32 .npy file. Without --output the
/// file lands in the configured feature directory under a timestamp name.
#[derive(Args)]
pub struct ExtractCommand {
    /// Audio file (WAV)
    audio: PathBuf,

    /// Feature file to write
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ExtractResult {
    audio: PathBuf,
    features: PathBuf,
}

impl ExtractCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let extractor = AudioExtractor::new(cfg.options.extractor_config())?;
        tracing::debug!(model = %extractor.model_path().display(), "acoustic model loaded");

        let features = match &self.output {
            Some(path) => extractor.extract_to(&self.audio, path)?,
            None => extractor.extract(&self.audio)?,
        };

        output_result(
            cli,
            &ExtractResult {
                audio: self.audio.clone(),
                features,
            },
        )
    }
}
