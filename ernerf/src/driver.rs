use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ernerf_dataset::InferenceDatasetBuilder;
use ernerf_features::{AudioExtractor, FeatureExtractor};
use ernerf_nerf::{
    merge_mapping, AcceleratorProbe, Checkpoint, CheckpointMerger, Device, MergeOutcome,
    ParameterStore, SystemProbe,
};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::options::{Options, RendererOptions};
use crate::renderer::Renderer;

/// Video container written by inference runs.
pub const VIDEO_EXT: &str = "mp4";

/// Outcome of one [`ErNerf::inference`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResult {
    pub video: PathBuf,
    pub elapsed: Duration,
}

/// Audio-to-video inference driver.
///
/// Construction resolves the device, loads the primary checkpoint and
/// merges the head checkpoint into the renderer; every later call reuses
/// that state. Calls to [`inference`](Self::inference) on one driver are
/// serialized on the renderer.
///
/// A renderer that starts with no parameters takes its layout from the
/// primary checkpoint, or from the head checkpoint when no primary exists.
pub struct ErNerf<R, E = AudioExtractor> {
    options: Options,
    render: RendererOptions,
    device: Device,
    merge: MergeOutcome,
    extractor: E,
    datasets: InferenceDatasetBuilder,
    renderer: Mutex<R>,
}

impl<R: Renderer> ErNerf<R, AudioExtractor> {
    /// Builds a driver with the default acoustic model and host device probe.
    pub fn new(options: Options, renderer: R) -> Result<Self> {
        Self::with_probe(options, renderer, &SystemProbe)
    }

    pub fn with_probe(options: Options, renderer: R, probe: &dyn AcceleratorProbe) -> Result<Self> {
        options.validate()?;
        let extractor = AudioExtractor::new(options.extractor_config())?;
        Self::build(options, renderer, extractor, probe)
    }
}

impl<R: Renderer, E: FeatureExtractor> ErNerf<R, E> {
    pub fn with_extractor(
        options: Options,
        renderer: R,
        extractor: E,
        probe: &dyn AcceleratorProbe,
    ) -> Result<Self> {
        options.validate()?;
        Self::build(options, renderer, extractor, probe)
    }

    fn build(
        options: Options,
        mut renderer: R,
        extractor: E,
        probe: &dyn AcceleratorProbe,
    ) -> Result<Self> {
        let device = options.device_request()?.resolve(probe)?;

        let merger = CheckpointMerger::new(options.torso, &options.head_ckpt);
        let merge = prepare_parameters(&options, &merger, renderer.parameters_mut())?;
        if let MergeOutcome::Merged(report) = &merge {
            report.warn();
            tracing::info!(
                head_ckpt = %merger.head_ckpt().display(),
                frozen = report.frozen.len(),
                "head checkpoint merged"
            );
        }

        let datasets = InferenceDatasetBuilder::new(options.dataset_options());
        Ok(Self {
            render: options.renderer_options(),
            options,
            device,
            merge,
            extractor,
            datasets,
            renderer: Mutex::new(renderer),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn merge_outcome(&self) -> &MergeOutcome {
        &self.merge
    }

    /// Runs `f` with exclusive access to the renderer.
    pub fn with_renderer<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.renderer.lock())
    }

    /// Renders a video for `audio`, or for the demo features when `audio` is
    /// `None` and demo mode is on.
    pub fn inference(&self, audio: Option<&Path>) -> Result<InferenceResult> {
        let start = Instant::now();
        let features = match audio {
            Some(audio) => self.extractor.extract(audio)?,
            None if self.options.demo_mode => self.options.demo_features(),
            None => return Err(Error::AudioRequired),
        };

        let handle = self.datasets.build(&features, self.device)?;

        let save_dir = self.options.save_dir();
        let mut renderer = self.renderer.lock();
        let name = video_name(&save_dir, chrono::Utc::now().timestamp_millis());
        renderer.test_run(&handle, &self.render, &save_dir, &name, self.options.render_mode())?;
        drop(renderer);

        let result = InferenceResult {
            video: save_dir.join(name),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            video = %result.video.display(),
            features = %features.display(),
            elapsed = ?result.elapsed,
            "inference done"
        );
        Ok(result)
    }
}

/// Loads the primary checkpoint into `store`, then merges the head checkpoint.
fn prepare_parameters(
    options: &Options,
    merger: &CheckpointMerger,
    store: &mut ParameterStore,
) -> Result<MergeOutcome> {
    let workspace = options.workspace_dir();
    let choice = options.checkpoint_choice();
    if !store.is_empty() {
        choice.load_into(&workspace, store)?;
        return Ok(merger.merge(store)?);
    }

    if let Some(path) = choice.resolve(&workspace)? {
        let ckpt = Checkpoint::load(&path)?;
        tracing::info!(
            path = %path.display(),
            epoch = ?ckpt.epoch(),
            tensors = ckpt.tensors.len(),
            "parameter layout from checkpoint"
        );
        *store = ParameterStore::from_mapping(ckpt.tensors);
        return Ok(merger.merge(store)?);
    }

    if merger.enabled() {
        let head = Checkpoint::load(merger.head_ckpt())?;
        tracing::info!(
            path = %merger.head_ckpt().display(),
            tensors = head.tensors.len(),
            "parameter layout from head checkpoint"
        );
        *store = ParameterStore::from_mapping(head.tensors.clone());
        return Ok(MergeOutcome::Merged(merge_mapping(store, &head.tensors)?));
    }

    tracing::warn!(
        workspace = %workspace.display(),
        "renderer has no parameters and no checkpoint was found"
    );
    Ok(MergeOutcome::Skipped)
}

/// First unused `<stamp>.mp4` name in `dir`, counting up from `stamp`.
fn video_name(dir: &Path, mut stamp: i64) -> String {
    loop {
        let name = format!("{stamp}.{VIDEO_EXT}");
        if !dir.join(&name).exists() {
            return name;
        }
        stamp += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_name_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(video_name(dir.path(), 42), "42.mp4");
        std::fs::write(dir.path().join("42.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("43.mp4"), b"").unwrap();
        assert_eq!(video_name(dir.path(), 42), "44.mp4");
    }
}
