use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ernerf::{ErNerf, Error, Options, RenderError, RenderMode, Renderer, RendererOptions};
use ernerf_audio::{write_wav, Format, Pcm};
use ernerf_dataset::{DatasetHandle, FULL_FRAME};
use ernerf_features::{FeatureArray, FeatureError, FeatureExtractor, LinearAcousticModel};
use ernerf_nerf::{
    AcceleratorProbe, Checkpoint, Device, MergeOutcome, ParameterMapping, ParameterStore, Tensor,
};

struct NoAccelerator;

impl AcceleratorProbe for NoAccelerator {
    fn cuda_available(&self) -> bool {
        false
    }
}

/// Writes the number of rendered frames into the output file.
#[derive(Default)]
struct FrameCountRenderer {
    params: ParameterStore,
    fps: Option<u32>,
}

impl Renderer for FrameCountRenderer {
    fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    fn test_run(
        &mut self,
        handle: &DatasetHandle,
        render: &RendererOptions,
        save_dir: &Path,
        name: &str,
        mode: RenderMode,
    ) -> Result<(), RenderError> {
        assert!(!handle.training);
        assert_eq!(handle.num_rays, FULL_FRAME);
        self.fps = Some(render.fps);
        std::fs::create_dir_all(save_dir).map_err(|e| RenderError::Other(e.to_string()))?;
        if mode == RenderMode::Frames {
            let images = save_dir.join(Path::new(name).file_stem().unwrap());
            std::fs::create_dir_all(images).map_err(|e| RenderError::Other(e.to_string()))?;
        }
        std::fs::write(save_dir.join(name), handle.loader.iter().count().to_string())
            .map_err(|e| RenderError::Other(e.to_string()))
    }
}

/// Counts calls; returns a fixed feature file.
struct CountingExtractor {
    calls: Arc<AtomicUsize>,
    output: PathBuf,
}

impl FeatureExtractor for CountingExtractor {
    fn extract(&self, _audio: &Path) -> Result<PathBuf, FeatureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let subject = dir.path().join("subject");
        std::fs::create_dir_all(&subject).unwrap();

        let frames: Vec<String> = (0..6)
            .map(|i| {
                format!(
                    r#"{{"img_id": {i}, "aud_id": {i}, "transform_matrix":
                        [[1,0,0,0],[0,1,0,{i}],[0,0,1,0],[0,0,0,1]]}}"#
                )
            })
            .collect();
        std::fs::write(
            subject.join("transforms_train.json"),
            format!(
                r#"{{"focal_len": 1100.0, "cx": 225.0, "cy": 225.0, "frames": [{}]}}"#,
                frames.join(",")
            ),
        )
        .unwrap();

        let mut csv = String::from("frame, timestamp, AU45_r\n");
        for i in 0..6 {
            csv.push_str(&format!("{}, {:.2}, {:.2}\n", i + 1, i as f32 * 0.04, 0.3 * i as f32));
        }
        std::fs::write(subject.join("au.csv"), csv).unwrap();

        let weight = (0..29 * 26).map(|i| ((i % 11) as f32 - 5.0) * 0.02).collect();
        let model = LinearAcousticModel::new(weight, vec![0.0; 29], 26).unwrap();
        std::fs::write(dir.path().join("acoustic.safetensors"), model.to_bytes().unwrap()).unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn options(&self) -> Options {
        let s = |p: PathBuf| p.to_string_lossy().into_owned();
        Options {
            workspace: s(self.path("workspace")),
            path: s(self.path("subject")),
            data_range: [0, 100],
            save_path: s(self.path("videos")),
            feature_dir: s(self.path("features")),
            acoustic_model: s(self.path("acoustic.safetensors")),
            model_cache_dir: s(self.path("cache")),
            ..Options::default()
        }
    }

    fn speech(&self, seconds: f64) -> PathBuf {
        let samples = (0..(seconds * 16000.0) as usize)
            .map(|i| (0.3 * (i as f32 * 0.07).sin() * (i as f32 * 0.0011).cos()))
            .collect();
        let path = self.path("speech.wav");
        write_wav(
            &path,
            &Pcm {
                format: Format::MONO_16K,
                samples,
            },
        )
        .unwrap();
        path
    }

    fn features(&self, frames: usize) -> PathBuf {
        let path = self.path("demo.npy");
        FeatureArray::zeros(vec![frames, 16, 29]).write_npy(&path).unwrap();
        path
    }
}

fn rendered_frames(video: &Path) -> usize {
    std::fs::read_to_string(video).unwrap().parse().unwrap()
}

#[test]
fn two_second_clip_renders_one_frame_per_feature_frame() {
    let fx = Fixture::new();
    let wav = fx.speech(2.0);
    let driver =
        ErNerf::with_probe(fx.options(), FrameCountRenderer::default(), &NoAccelerator).unwrap();
    assert_eq!(driver.device(), Device::Cpu);
    assert_eq!(driver.merge_outcome(), &MergeOutcome::Skipped);

    let result = driver.inference(Some(wav.as_path())).unwrap();

    assert!(result.video.exists());
    assert_eq!(result.video.parent().unwrap(), fx.path("videos"));
    assert_eq!(result.video.extension().unwrap(), "mp4");
    let stem = result.video.file_stem().unwrap().to_str().unwrap();
    assert!(stem.parse::<i64>().is_ok(), "{stem} is not a timestamp");
    assert_eq!(rendered_frames(&result.video), 100);

    let features: Vec<_> = std::fs::read_dir(fx.path("features")).unwrap().collect();
    assert_eq!(features.len(), 1);
}

#[test]
fn repeated_calls_write_distinct_videos() {
    let fx = Fixture::new();
    let wav = fx.speech(0.5);
    let driver =
        ErNerf::with_probe(fx.options(), FrameCountRenderer::default(), &NoAccelerator).unwrap();

    let first = driver.inference(Some(wav.as_path())).unwrap();
    let second = driver.inference(Some(wav.as_path())).unwrap();
    assert_ne!(first.video, second.video);
    assert_eq!(rendered_frames(&second.video), 25);
}

#[test]
fn demo_mode_renders_configured_features_without_extraction() {
    let fx = Fixture::new();
    let demo = fx.features(12);
    let calls = Arc::new(AtomicUsize::new(0));
    let extractor = CountingExtractor {
        calls: calls.clone(),
        output: fx.path("unused.npy"),
    };
    let options = Options {
        demo_mode: true,
        aud: demo.to_string_lossy().into_owned(),
        ..fx.options()
    };

    let driver = ErNerf::with_extractor(
        options,
        FrameCountRenderer::default(),
        extractor,
        &NoAccelerator,
    )
    .unwrap();
    let result = driver.inference(None).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(rendered_frames(&result.video), 12);
}

#[test]
fn missing_audio_without_demo_mode_fails() {
    let fx = Fixture::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let extractor = CountingExtractor {
        calls: calls.clone(),
        output: fx.features(3),
    };
    let driver = ErNerf::with_extractor(
        fx.options(),
        FrameCountRenderer::default(),
        extractor,
        &NoAccelerator,
    )
    .unwrap();

    assert!(matches!(driver.inference(None), Err(Error::AudioRequired)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!fx.path("videos").exists());
}

#[test]
fn missing_audio_file_is_input_not_found() {
    let fx = Fixture::new();
    let driver =
        ErNerf::with_probe(fx.options(), FrameCountRenderer::default(), &NoAccelerator).unwrap();

    let err = driver.inference(Some(fx.path("nope.wav").as_path())).unwrap_err();
    assert!(matches!(err, Error::Features(FeatureError::InputNotFound(_))));
    assert!(!fx.path("features").exists() || std::fs::read_dir(fx.path("features")).unwrap().next().is_none());
}

#[test]
fn head_checkpoint_is_merged_and_frozen_at_construction() {
    let fx = Fixture::new();
    let mut head = ParameterMapping::new();
    head.insert("sigma_net.0.weight".into(), Tensor::full(vec![2, 2], 1.5));
    head.insert("grid.embeddings".into(), Tensor::full(vec![3], 1.0));
    let head_path = fx.path("head.safetensors");
    Checkpoint::new(head).save(&head_path).unwrap();

    let mut params = ParameterStore::new();
    params.insert("sigma_net.0.weight", Tensor::zeros(vec![2, 2]));
    params.insert("torso_net.0.weight", Tensor::zeros(vec![4]));

    let options = Options {
        torso: true,
        head_ckpt: head_path.to_string_lossy().into_owned(),
        ..fx.options()
    };
    let driver = ErNerf::with_probe(
        options,
        FrameCountRenderer { params, ..Default::default() },
        &NoAccelerator,
    )
    .unwrap();

    let MergeOutcome::Merged(report) = driver.merge_outcome() else {
        panic!("head checkpoint was not merged");
    };
    assert_eq!(report.frozen_names().collect::<Vec<_>>(), vec!["sigma_net.0.weight"]);
    assert_eq!(report.unexpected_keys, vec!["grid.embeddings"]);
    assert_eq!(report.missing_keys, vec!["torso_net.0.weight"]);

    driver.with_renderer(|r| {
        assert_eq!(r.parameters().frozen(), vec!["sigma_net.0.weight"]);
        let w = r.parameters().get("sigma_net.0.weight").unwrap();
        assert_eq!(w.tensor.data(), &[1.5; 4]);
        assert!(r.parameters().get("torso_net.0.weight").unwrap().requires_grad);
    });
}

#[test]
fn head_checkpoint_shape_mismatch_fails_construction() {
    let fx = Fixture::new();
    let mut head = ParameterMapping::new();
    head.insert("sigma_net.0.weight".into(), Tensor::full(vec![5], 1.0));
    let head_path = fx.path("head.safetensors");
    Checkpoint::new(head).save(&head_path).unwrap();

    let mut params = ParameterStore::new();
    params.insert("sigma_net.0.weight", Tensor::zeros(vec![2, 2]));
    let options = Options {
        head_ckpt: head_path.to_string_lossy().into_owned(),
        ..fx.options()
    };

    let result = ErNerf::with_probe(
        options,
        FrameCountRenderer { params, ..Default::default() },
        &NoAccelerator,
    );
    assert!(matches!(
        result,
        Err(Error::Nerf(ernerf_nerf::NerfError::ShapeMismatch { .. }))
    ));
}

#[test]
fn latest_workspace_checkpoint_is_loaded_without_freezing() {
    let fx = Fixture::new();
    let mut ckpt = ParameterMapping::new();
    ckpt.insert("sigma_net.0.weight".into(), Tensor::full(vec![2], 7.0));
    Checkpoint::new(ckpt)
        .save(fx.path("workspace/checkpoints/ngp_ep0003.safetensors"))
        .unwrap();

    let mut params = ParameterStore::new();
    params.insert("sigma_net.0.weight", Tensor::zeros(vec![2]));
    let driver = ErNerf::with_probe(
        fx.options(),
        FrameCountRenderer { params, ..Default::default() },
        &NoAccelerator,
    )
    .unwrap();

    driver.with_renderer(|r| {
        assert_eq!(r.parameters().get("sigma_net.0.weight").unwrap().tensor.data(), &[7.0, 7.0]);
        assert!(r.parameters().frozen().is_empty());
    });
}

#[test]
fn explicit_cuda_without_accelerator_fails() {
    let fx = Fixture::new();
    let options = Options {
        device: "cuda".into(),
        ..fx.options()
    };
    let result = ErNerf::with_probe(options, FrameCountRenderer::default(), &NoAccelerator);
    assert!(matches!(
        result,
        Err(Error::Nerf(ernerf_nerf::NerfError::DeviceUnavailable(_)))
    ));
}

#[test]
fn empty_renderer_takes_layout_from_workspace_checkpoint() {
    let fx = Fixture::new();
    let mut ckpt = ParameterMapping::new();
    ckpt.insert("sigma_net.0.weight".into(), Tensor::full(vec![2], 7.0));
    ckpt.insert("torso_net.0.weight".into(), Tensor::full(vec![3], 2.0));
    Checkpoint::new(ckpt)
        .save(fx.path("workspace/checkpoints/ngp_ep0001.safetensors"))
        .unwrap();

    let driver =
        ErNerf::with_probe(fx.options(), FrameCountRenderer::default(), &NoAccelerator).unwrap();

    driver.with_renderer(|r| {
        assert_eq!(r.parameters().len(), 2);
        assert_eq!(r.parameters().get("torso_net.0.weight").unwrap().tensor.data(), &[2.0; 3]);
        assert!(r.parameters().frozen().is_empty());
    });
}

#[test]
fn fresh_torso_workspace_freezes_every_head_parameter() {
    let fx = Fixture::new();
    let mut head = ParameterMapping::new();
    head.insert("sigma_net.0.weight".into(), Tensor::full(vec![2, 2], 1.5));
    head.insert("encoder.embeddings".into(), Tensor::full(vec![3], 1.0));
    let head_path = fx.path("head.safetensors");
    Checkpoint::new(head).save(&head_path).unwrap();

    let options = Options {
        torso: true,
        ckpt: "latest".into(),
        head_ckpt: head_path.to_string_lossy().into_owned(),
        ..fx.options()
    };
    let driver =
        ErNerf::with_probe(options, FrameCountRenderer::default(), &NoAccelerator).unwrap();

    let MergeOutcome::Merged(report) = driver.merge_outcome() else {
        panic!("head checkpoint was not merged");
    };
    assert_eq!(
        report.frozen_names().collect::<Vec<_>>(),
        vec!["encoder.embeddings", "sigma_net.0.weight"]
    );
    assert!(report.unexpected_keys.is_empty());
    assert!(report.missing_keys.is_empty());
    driver.with_renderer(|r| {
        assert_eq!(r.parameters().frozen(), vec!["encoder.embeddings", "sigma_net.0.weight"]);
        assert_eq!(r.parameters().get("sigma_net.0.weight").unwrap().tensor.data(), &[1.5; 4]);
    });
}

#[test]
fn renderer_receives_options_fps_and_image_mode() {
    let fx = Fixture::new();
    let wav = fx.speech(1.0);
    let options = Options {
        fps: 25,
        write_image: true,
        ..fx.options()
    };
    let driver =
        ErNerf::with_probe(options, FrameCountRenderer::default(), &NoAccelerator).unwrap();

    let result = driver.inference(Some(wav.as_path())).unwrap();

    assert_eq!(rendered_frames(&result.video), 25);
    assert!(result.video.with_extension("").is_dir());
    driver.with_renderer(|r| assert_eq!(r.fps, Some(25)));
}
