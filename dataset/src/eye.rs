//! Eye openness from facial action unit intensities (`au.csv`).

use std::path::Path;

use crate::error::DatasetError;

/// Blink action unit column. The leading space is part of the header.
pub const BLINK_COLUMN: &str = " AU45_r";

/// Reads the blink column of an action unit CSV, one value per image.
pub fn read_blink_column(path: &Path) -> Result<Vec<f32>, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|e| DatasetError::read(path, e))?;
    parse_blink_column(&text)
}

pub fn parse_blink_column(text: &str) -> Result<Vec<f32>, DatasetError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| DatasetError::DatasetFormat("empty action unit csv".into()))?;
    let column = header
        .split(',')
        .position(|h| h == BLINK_COLUMN || h.trim() == BLINK_COLUMN.trim())
        .ok_or_else(|| DatasetError::DatasetFormat(format!("column {BLINK_COLUMN:?} missing")))?;

    lines
        .enumerate()
        .map(|(row, line)| {
            line.split(',')
                .nth(column)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .ok_or_else(|| {
                    DatasetError::DatasetFormat(format!("row {}: bad {BLINK_COLUMN:?} value", row + 1))
                })
        })
        .collect()
}

/// Maps a blink intensity in `[0, 5]` to an eye area in `[0, 1]`.
pub fn eye_area(blink: f32) -> f32 {
    blink.clamp(0.0, 2.0) / 2.0
}

/// Averages every value with its immediate neighbours.
pub fn smooth_eye(areas: &[f32]) -> Vec<f32> {
    let n = areas.len();
    (0..n)
        .map(|i| {
            let window = &areas[i.saturating_sub(1)..(i + 2).min(n)];
            window.iter().sum::<f32>() / window.len() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "frame, face_id, timestamp, AU45_r, AU45_c\n\
                       1, 0, 0.00, 0.50, 0\n\
                       2, 0, 0.04, 3.10, 1\n\
                       3, 0, 0.08, 1.00, 1\n";

    #[test]
    fn reads_blink_column() {
        assert_eq!(parse_blink_column(CSV).unwrap(), vec![0.5, 3.1, 1.0]);
    }

    #[test]
    fn missing_column_is_format_error() {
        assert!(matches!(
            parse_blink_column("frame, AU01_r\n1, 0.2\n"),
            Err(DatasetError::DatasetFormat(_))
        ));
    }

    #[test]
    fn eye_area_clips_and_halves() {
        assert_eq!(eye_area(-0.3), 0.0);
        assert_eq!(eye_area(1.0), 0.5);
        assert_eq!(eye_area(3.1), 1.0);
    }

    #[test]
    fn smoothing_uses_three_taps() {
        let smoothed = smooth_eye(&[0.0, 0.3, 0.6, 0.9]);
        for (got, want) in smoothed.iter().zip([0.15, 0.3, 0.6, 0.75]) {
            assert!((got - want).abs() < 1e-6, "{smoothed:?}");
        }
    }
}
