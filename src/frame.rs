//! Captured video frames.
//!
//! A `Frame` owns its RGB pixels and carries the capture index and UTC capture time.
//! Sources hand frames to the pipeline by value; nothing retains a frame beyond the
//! iteration that processes it.

use chrono::{DateTime, Utc};
use image::imageops::FilterType;
use image::RgbImage;

pub struct Frame {
    /// Position in capture order, starting at 1 for each opened source.
    pub index: u64,
    /// Wall-clock capture time.
    pub captured_at: DateTime<Utc>,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self {
            index,
            captured_at: Utc::now(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resize to the working resolution. No-op when the frame already matches.
    pub fn resized(self, width: u32, height: u32) -> Self {
        if self.image.width() == width && self.image.height() == height {
            return self;
        }
        let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
        Self {
            index: self.index,
            captured_at: self.captured_at,
            image,
        }
    }

    /// Take ownership of the pixel buffer (e.g. as a drawing canvas).
    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("captured_at", &self.captured_at)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
