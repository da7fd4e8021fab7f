//! Side-by-side comparison videos: original on the left, normalized on
//! the right, each half labelled when a font is available.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use tempo_clip_model::frame::Frame;
use tempo_common::error::{TempoError, TempoResult};

use crate::ffmpeg::VideoSink;

const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_MARGIN: i32 = 10;
const LABEL_MAX_SCALE: f32 = 30.0;

/// Fonts tried when no label font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font used to caption the two halves of a comparison frame.
pub struct ComparisonLabels {
    font: FontVec,
}

impl ComparisonLabels {
    /// Load a TrueType/OpenType font from `path`.
    pub fn load(path: &Path) -> TempoResult<Self> {
        if !path.exists() {
            return Err(TempoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| {
            TempoError::config(format!("Invalid label font {}: {e}", path.display()))
        })?;
        Ok(Self { font })
    }

    /// Load the configured font, or the first system font that parses.
    /// `None` means comparisons are written unlabelled.
    pub fn find(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::load(path) {
                Ok(labels) => return Some(labels),
                Err(e) => tracing::warn!(error = %e, "Configured label font unusable"),
            }
        }
        let found = SYSTEM_FONTS
            .iter()
            .map(PathBuf::from)
            .filter(|path| path.exists())
            .find_map(|path| Self::load(&path).ok());
        if found.is_none() {
            tracing::debug!("No label font found; comparison frames stay unlabelled");
        }
        found
    }

    /// Caption scale for a frame `height` pixels tall.
    fn scale(height: u32) -> f32 {
        (height as f32 / 3.0).min(LABEL_MAX_SCALE)
    }

    fn draw(&self, canvas: &mut RgbImage, x: u32, text: &str) {
        let scale = Self::scale(canvas.height());
        if scale < 6.0 {
            return;
        }
        draw_text_mut(
            canvas,
            LABEL_COLOR,
            x as i32 + LABEL_MARGIN,
            LABEL_MARGIN,
            PxScale::from(scale),
            &self.font,
            text,
        );
    }
}

/// Pair frames up and place them next to each other. The output stops at
/// the end of the shorter sequence.
pub fn side_by_side(
    left: &[Frame],
    right: &[Frame],
    labels: Option<&ComparisonLabels>,
) -> Vec<Frame> {
    left.iter()
        .zip(right)
        .map(|(l, r)| {
            let mut canvas = RgbImage::new(l.width() + r.width(), l.height().max(r.height()));
            imageops::replace(&mut canvas, l.rgb(), 0, 0);
            imageops::replace(&mut canvas, r.rgb(), l.width() as i64, 0);
            if let Some(labels) = labels {
                labels.draw(&mut canvas, 0, "ORIGINAL");
                labels.draw(&mut canvas, l.width(), "NORMALIZED");
            }
            Frame::new(canvas)
        })
        .collect()
}

/// Build and encode a comparison video at the original frame rate.
pub fn write_comparison(
    sink: &dyn VideoSink,
    original: &[Frame],
    normalized: &[Frame],
    labels: Option<&ComparisonLabels>,
    path: &Path,
    fps: f64,
) -> TempoResult<usize> {
    let frames = side_by_side(original, normalized, labels);
    let (width, height) = frames
        .first()
        .map(|f| (f.width(), f.height()))
        .unwrap_or((0, 0));
    sink.encode(&frames, path, fps, width, height)?;

    tracing::info!(
        output = %path.display(),
        frames = frames.len(),
        labelled = labels.is_some(),
        "Comparison video written"
    );
    Ok(frames.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn green_pixels(frame: &Frame, xs: std::ops::Range<u32>) -> usize {
        let rgb = frame.rgb();
        xs.flat_map(|x| (0..rgb.height()).map(move |y| (x, y)))
            .filter(|&(x, y)| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                g > 100 && r < 50 && b < 50
            })
            .count()
    }

    #[test]
    fn test_side_by_side_geometry() {
        let left = vec![Frame::solid(4, 3, [255, 0, 0]); 5];
        let right = vec![Frame::solid(4, 3, [0, 0, 255]); 3];
        let out = side_by_side(&left, &right, None);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].width(), 8);
        assert_eq!(out[0].height(), 3);
        assert_eq!(out[0].rgb().get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(out[0].rgb().get_pixel(3, 2).0, [255, 0, 0]);
        assert_eq!(out[0].rgb().get_pixel(4, 0).0, [0, 0, 255]);
        assert_eq!(out[0].rgb().get_pixel(7, 2).0, [0, 0, 255]);
    }

    #[test]
    fn test_side_by_side_empty() {
        let left = vec![Frame::solid(2, 2, [1, 1, 1])];
        assert!(side_by_side(&left, &[], None).is_empty());
    }

    #[test]
    fn test_labels_mark_both_halves() {
        let Some(labels) = ComparisonLabels::find(None) else {
            return;
        };
        let left = vec![Frame::solid(240, 90, [0, 0, 0])];
        let right = vec![Frame::solid(240, 90, [0, 0, 0])];
        let out = side_by_side(&left, &right, Some(&labels));

        assert!(green_pixels(&out[0], 0..240) > 0);
        assert!(green_pixels(&out[0], 240..480) > 0);
        // Captions stay in the top band.
        assert_eq!(out[0].rgb().get_pixel(120, 89).0, [0, 0, 0]);
    }

    #[test]
    fn test_tiny_frames_skip_labels() {
        let Some(labels) = ComparisonLabels::find(None) else {
            return;
        };
        let frames = vec![Frame::solid(8, 8, [0, 0, 0])];
        let out = side_by_side(&frames, &frames, Some(&labels));
        assert_eq!(green_pixels(&out[0], 0..16), 0);
    }

    #[test]
    fn test_missing_label_font() {
        let missing = Path::new("/nonexistent/tempo-label.ttf");
        assert!(matches!(
            ComparisonLabels::load(missing),
            Err(TempoError::FileNotFound { .. })
        ));
        // A bad configured path still falls back to system fonts.
        let _ = ComparisonLabels::find(Some(missing));
    }
}
