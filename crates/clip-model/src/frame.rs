//! Frames and decoded clips.

use std::sync::Arc;

use image::{GrayImage, RgbImage};

/// One decoded video frame.
///
/// The pixel buffer is shared: cloning a frame bumps a reference count, so
/// a retimed sequence can emit the same source frame several times without
/// copying pixels. Frames are never mutated after decode.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
}

impl Frame {
    /// Wrap an RGB buffer.
    pub fn new(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Build a frame from packed rgb24 bytes.
    ///
    /// Returns `None` when `data` does not hold exactly `width * height * 3`
    /// bytes.
    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying pixels.
    pub fn rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Packed rgb24 bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Grayscale plane used for motion analysis.
    pub fn luma(&self) -> GrayImage {
        image::imageops::grayscale(self.image.as_ref())
    }

    /// Whether two frames share the same pixel buffer.
    pub fn same_buffer(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

/// A fully decoded clip, resident in memory for random access.
#[derive(Debug, Clone)]
pub struct Clip {
    /// Frames in playback order.
    pub frames: Vec<Frame>,
    /// Frame rate reported by the source. May be invalid (0, NaN, absurdly
    /// high); callers resolve it before planning.
    pub fps: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl Clip {
    pub fn new(frames: Vec<Frame>, fps: f64, width: u32, height: u32) -> Self {
        Self {
            frames,
            fps,
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Playback duration at `fps`, in seconds.
    pub fn duration_secs(&self, fps: f64) -> f64 {
        if fps > 0.0 {
            self.frames.len() as f64 / fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb24_checks_length() {
        assert!(Frame::from_rgb24(2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_rgb24(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_clone_shares_pixels() {
        let frame = Frame::solid(4, 3, [10, 20, 30]);
        let copy = frame.clone();
        assert!(frame.same_buffer(&copy));
        assert!(!frame.same_buffer(&Frame::solid(4, 3, [10, 20, 30])));
    }

    #[test]
    fn test_luma_dimensions_and_value() {
        let frame = Frame::solid(5, 2, [200, 200, 200]);
        let gray = frame.luma();
        assert_eq!(gray.dimensions(), (5, 2));
        assert_eq!(gray.get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn test_clip_duration() {
        let frames = vec![Frame::solid(1, 1, [0, 0, 0]); 48];
        let clip = Clip::new(frames, 24.0, 1, 1);
        assert_eq!(clip.len(), 48);
        assert!((clip.duration_secs(24.0) - 2.0).abs() < 1e-12);
        assert_eq!(clip.duration_secs(0.0), 0.0);
    }
}
