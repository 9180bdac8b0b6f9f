use std::path::Path;

use ernerf_nerf::Device;

use crate::audio::AudioFeatures;
use crate::dataset::{DatasetOptions, Layout, NerfDataset, FULL_FRAME};
use crate::error::DatasetError;
use crate::loader::DataLoader;

/// Per-call renderer conditioning.
#[derive(Debug, Clone)]
pub struct RenderInputs {
    /// `[frames, dim, window]`.
    pub aud_features: AudioFeatures,
    /// One value per pose, absent when eye conditioning is off.
    pub eye_areas: Option<Vec<f32>>,
}

/// Everything a test-time render needs.
#[derive(Debug, Clone)]
pub struct DatasetHandle {
    pub loader: DataLoader,
    pub inputs: RenderInputs,
    pub intrinsics: [f32; 4],
    pub height: usize,
    pub width: usize,
    pub device: Device,
    pub training: bool,
    pub num_rays: i64,
}

/// Builds test-time datasets from the training layout.
///
/// The subject's training poses drive the camera while the supplied audio
/// features drive the mouth; rendering is sequential and full-frame.
#[derive(Debug, Clone)]
pub struct InferenceDatasetBuilder {
    opts: DatasetOptions,
}

impl InferenceDatasetBuilder {
    pub fn new(opts: DatasetOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.opts
    }

    pub fn build(&self, feature_path: &Path, device: Device) -> Result<DatasetHandle, DatasetError> {
        let mut dataset = NerfDataset::new(&self.opts, Some(feature_path), Layout::Train, device)?;
        dataset.training = false;
        dataset.num_rays = FULL_FRAME;

        let loader = dataset.dataloader();
        tracing::info!(
            features = %feature_path.display(),
            batches = loader.len(),
            poses = dataset.poses.len(),
            "built inference dataset"
        );
        Ok(DatasetHandle {
            loader,
            inputs: RenderInputs {
                aud_features: dataset.auds,
                eye_areas: dataset.eye_areas,
            },
            intrinsics: dataset.intrinsics,
            height: dataset.height,
            width: dataset.width,
            device: dataset.device,
            training: dataset.training,
            num_rays: dataset.num_rays,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ernerf_features::FeatureArray;
    use std::path::PathBuf;

    fn write_subject(dir: &Path, frames: usize) {
        let entries: Vec<String> = (0..frames)
            .map(|i| {
                format!(
                    r#"{{"img_id": {i}, "aud_id": {i}, "transform_matrix":
                        [[1,0,0,{i}],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}}"#
                )
            })
            .collect();
        let json = format!(
            r#"{{"focal_len": 1000.0, "cx": 225.0, "cy": 225.0, "frames": [{}]}}"#,
            entries.join(",")
        );
        std::fs::write(dir.join("transforms_train.json"), json).unwrap();

        let mut csv = String::from("frame, AU45_r\n");
        for i in 0..frames {
            csv.push_str(&format!("{}, {}\n", i + 1, i as f32 * 0.5));
        }
        std::fs::write(dir.join("au.csv"), csv).unwrap();
    }

    fn write_features(dir: &Path, frames: usize) -> PathBuf {
        let path = dir.join("speech.npy");
        FeatureArray::zeros(vec![frames, 16, 29]).write_npy(&path).unwrap();
        path
    }

    fn options(dir: &Path) -> DatasetOptions {
        DatasetOptions {
            path: dir.to_path_buf(),
            data_range: [0, 100],
            ..DatasetOptions::default()
        }
    }

    #[test]
    fn test_behavior_on_train_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), 4);
        let features = write_features(dir.path(), 10);

        let handle = InferenceDatasetBuilder::new(options(dir.path()))
            .build(&features, Device::Cpu)
            .unwrap();

        assert!(!handle.training);
        assert_eq!(handle.num_rays, FULL_FRAME);
        assert_eq!(handle.loader.len(), 10);
        assert_eq!(handle.loader.batch_size(), 1);
        assert_eq!(handle.inputs.aud_features.shape(), &[10, 29, 16]);
        assert_eq!(handle.inputs.eye_areas.as_ref().unwrap().len(), 4);
        assert_eq!((handle.height, handle.width), (450, 450));

        let pose_indices: Vec<usize> = handle.loader.iter().map(|b| b.pose_index).collect();
        assert_eq!(pose_indices, vec![0, 1, 2, 3, 3, 2, 1, 0, 0, 1]);
        assert!(handle.loader.iter().all(|b| b.num_rays == FULL_FRAME));
    }

    #[test]
    fn batches_carry_pose_window_and_eye() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), 4);
        let features = write_features(dir.path(), 6);

        let handle = InferenceDatasetBuilder::new(options(dir.path()))
            .build(&features, Device::Cpu)
            .unwrap();
        let batch = handle.loader.batch(5).unwrap();
        assert_eq!(batch.pose_index, 2);
        // x translation 2, moved to the NGP z row and scaled by 4
        assert_eq!(batch.pose[2][3], 8.0);
        assert_eq!(batch.eye, Some(0.5));
        assert_eq!(batch.aud_window.len(), 8);
        assert_eq!(batch.aud_window[0], Some(1));
        assert_eq!(batch.aud_window[7], None);
        assert!(handle.loader.batch(6).is_none());
    }

    #[test]
    fn default_data_range_drops_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), 4);
        let features = write_features(dir.path(), 2);

        let opts = DatasetOptions {
            path: dir.path().to_path_buf(),
            ..DatasetOptions::default()
        };
        let handle = InferenceDatasetBuilder::new(opts).build(&features, Device::Cpu).unwrap();
        assert_eq!(handle.inputs.eye_areas.unwrap().len(), 3);
    }

    #[test]
    fn fixed_eye_skips_action_units() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), 3);
        std::fs::remove_file(dir.path().join("au.csv")).unwrap();
        let features = write_features(dir.path(), 3);

        let opts = DatasetOptions {
            fix_eye: 0.25,
            ..options(dir.path())
        };
        let handle = InferenceDatasetBuilder::new(opts).build(&features, Device::Cpu).unwrap();
        assert_eq!(handle.inputs.eye_areas.unwrap(), vec![0.25; 3]);
    }

    #[test]
    fn wrong_feature_width_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), 3);
        let path = dir.path().join("hubert.npy");
        FeatureArray::zeros(vec![3, 16, 1024]).write_npy(&path).unwrap();

        let err = InferenceDatasetBuilder::new(options(dir.path()))
            .build(&path, Device::Cpu)
            .unwrap_err();
        assert!(matches!(err, DatasetError::DatasetFormat(_)));
    }

    #[test]
    fn missing_transforms_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let features = write_features(dir.path(), 3);
        let err = InferenceDatasetBuilder::new(options(dir.path()))
            .build(&features, Device::Cpu)
            .unwrap_err();
        assert!(matches!(err, DatasetError::InputNotFound(_)));
    }
}
