//! `transforms_<layout>.json`: camera intrinsics and per-frame poses.

use std::path::Path;

use serde::Deserialize;

use crate::error::DatasetError;

/// Row-major 4x4 camera-to-world matrix.
pub type Pose = [[f32; 4]; 4];

#[derive(Debug, Clone, Deserialize)]
pub struct TransformsFile {
    pub focal_len: f32,
    pub cx: f32,
    pub cy: f32,
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameEntry {
    pub img_id: usize,
    #[serde(default)]
    pub aud_id: Option<usize>,
    pub transform_matrix: Pose,
}

impl TransformsFile {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::read(path, e))?;
        serde_json::from_str(&text).map_err(|source| DatasetError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `[fx, fy, cx, cy]`.
    pub fn intrinsics(&self) -> [f32; 4] {
        [self.focal_len, self.focal_len, self.cx, self.cy]
    }

    /// Image size implied by the principal point, `(H, W)`.
    pub fn image_size(&self) -> (usize, usize) {
        (self.cy as usize * 2, self.cx as usize * 2)
    }
}

/// Applies a Python-style `[start, end)` slice, where negative bounds count
/// from the end.
pub fn slice_range(len: usize, range: [i64; 2]) -> std::ops::Range<usize> {
    let resolve = |v: i64| -> usize {
        if v < 0 {
            (len as i64 + v).max(0) as usize
        } else {
            (v as usize).min(len)
        }
    };
    let start = resolve(range[0]);
    let end = resolve(range[1]).max(start);
    start..end
}

/// Converts a NeRF (OpenGL) camera pose to the NGP convention: axes rotated
/// `(x, y, z) -> (y, z, x)`, camera y and z flipped, translation scaled and
/// offset.
pub fn nerf_matrix_to_ngp(pose: &Pose, scale: f32, offset: [f32; 3]) -> Pose {
    let row = |src: usize, off: f32| {
        [
            pose[src][0],
            -pose[src][1],
            -pose[src][2],
            pose[src][3] * scale + off,
        ]
    };
    [
        row(1, offset[0]),
        row(2, offset[1]),
        row(0, offset[2]),
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Smooths a pose sequence with a centred moving average of `kernel` frames.
///
/// Translations are averaged directly; averaged rotations are projected back
/// onto a rotation by Gram-Schmidt.
pub fn smooth_camera_path(poses: &[Pose], kernel: usize) -> Vec<Pose> {
    let n = poses.len();
    let k = kernel / 2;
    (0..n)
        .map(|i| {
            let window = &poses[i.saturating_sub(k)..(i + k + 1).min(n)];
            let count = window.len() as f32;
            let mut out = poses[i];
            let mut rot = [[0.0f32; 3]; 3];
            for r in 0..3 {
                out[r][3] = window.iter().map(|p| p[r][3]).sum::<f32>() / count;
                for c in 0..3 {
                    rot[r][c] = window.iter().map(|p| p[r][c]).sum::<f32>() / count;
                }
            }
            let rot = orthonormalize(rot);
            for r in 0..3 {
                out[r][..3].copy_from_slice(&rot[r]);
            }
            out
        })
        .collect()
}

/// Gram-Schmidt over the columns of `m`.
fn orthonormalize(m: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let col = |c: usize| [m[0][c], m[1][c], m[2][c]];
    let dot = |a: [f32; 3], b: [f32; 3]| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let normalize = |v: [f32; 3]| {
        let n = dot(v, v).sqrt().max(f32::EPSILON);
        [v[0] / n, v[1] / n, v[2] / n]
    };
    let sub = |a: [f32; 3], b: [f32; 3], s: f32| [a[0] - b[0] * s, a[1] - b[1] * s, a[2] - b[2] * s];

    let x = normalize(col(0));
    let y = normalize(sub(col(1), x, dot(col(1), x)));
    let z = [
        x[1] * y[2] - x[2] * y[1],
        x[2] * y[0] - x[0] * y[2],
        x[0] * y[1] - x[1] * y[0],
    ];
    let mut out = [[0.0; 3]; 3];
    for r in 0..3 {
        out[r] = [x[r], y[r], z[r]];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: Pose = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    fn translated(x: f32) -> Pose {
        let mut p = IDENTITY;
        p[0][3] = x;
        p
    }

    #[test]
    fn parses_transforms() {
        let json = r#"{
            "focal_len": 1200.0, "cx": 225.0, "cy": 225.0,
            "frames": [{"img_id": 0, "aud_id": 0, "transform_matrix":
                [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}]
        }"#;
        let t: TransformsFile = serde_json::from_str(json).unwrap();
        assert_eq!(t.frames.len(), 1);
        assert_eq!(t.image_size(), (450, 450));
        assert_eq!(t.intrinsics(), [1200.0, 1200.0, 225.0, 225.0]);
    }

    #[test]
    fn python_style_slices() {
        assert_eq!(slice_range(10, [0, -1]), 0..9);
        assert_eq!(slice_range(10, [2, 5]), 2..5);
        assert_eq!(slice_range(10, [0, 100]), 0..10);
        assert_eq!(slice_range(10, [-3, -1]), 7..9);
        assert_eq!(slice_range(10, [8, 2]), 8..8);
    }

    #[test]
    fn ngp_conversion_permutes_and_scales() {
        let mut pose = IDENTITY;
        pose[0][3] = 1.0;
        pose[1][3] = 2.0;
        pose[2][3] = 3.0;
        let ngp = nerf_matrix_to_ngp(&pose, 4.0, [0.0, 0.5, 0.0]);
        assert_eq!(ngp[0], [0.0, -1.0, -0.0, 8.0]);
        assert_eq!(ngp[1], [0.0, -0.0, -1.0, 12.5]);
        assert_eq!(ngp[2], [1.0, -0.0, -0.0, 4.0]);
        assert_eq!(ngp[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn smoothing_averages_translation() {
        let poses = vec![translated(0.0), translated(3.0), translated(6.0)];
        let smoothed = smooth_camera_path(&poses, 3);
        assert_eq!(smoothed[0][0][3], 1.5);
        assert_eq!(smoothed[1][0][3], 3.0);
        assert_eq!(smoothed[2][0][3], 4.5);
        assert_eq!(smoothed[1][0][..3], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn smoothed_rotation_stays_orthonormal() {
        let mut tilted = IDENTITY;
        let (s, c) = 0.3f32.sin_cos();
        tilted[0][0] = c;
        tilted[0][1] = -s;
        tilted[1][0] = s;
        tilted[1][1] = c;
        let smoothed = smooth_camera_path(&[IDENTITY, tilted], 3);
        for p in &smoothed {
            for c in 0..3 {
                let norm: f32 = (0..3).map(|r| p[r][c] * p[r][c]).sum();
                assert!((norm - 1.0).abs() < 1e-5);
            }
        }
    }
}
