use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::RawDetection;
use crate::frame::Frame;
use crate::BoundingBox;

const DEFAULT_SEED: u64 = 0x5eed_f10c;
const SPAWN_EVERY_FRAMES: u64 = 12;
const ANIMAL_WIDTH: f32 = 48.0;
const ANIMAL_HEIGHT: f32 = 32.0;

struct Animal {
    track_ref: u64,
    class_label: &'static str,
    x: f32,
    y: f32,
    speed: f32,
}

/// Simulated, tracked herd walking down the frame.
///
/// Stands in for a real detector so the daemon can be exercised end to end without a
/// model. Track references are deliberately large and sparse. Roughly one animal in
/// eight is a dog, which the counting policy must ignore.
pub struct HerdBackend {
    seed: u64,
    rng: StdRng,
    animals: Vec<Animal>,
    next_ref: u64,
    frames_seen: u64,
}

impl HerdBackend {
    pub const NAME: &'static str = "scripted-herd";

    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            animals: Vec::new(),
            next_ref: 1_000,
            frames_seen: 0,
        }
    }

    fn spawn(&mut self, width: f32) {
        let max_x = (width - ANIMAL_WIDTH).max(1.0);
        self.next_ref += self.rng.gen_range(1..50);
        let class_label = if self.rng.gen_ratio(1, 8) {
            "dog"
        } else {
            "sheep"
        };
        self.animals.push(Animal {
            track_ref: self.next_ref,
            class_label,
            x: self.rng.gen_range(0.0..max_x),
            y: 0.0,
            speed: self.rng.gen_range(3.0..9.0),
        });
    }
}

impl Default for HerdBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for HerdBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::ObjectDetection | DetectionCapability::Tracking
        )
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let width = frame.width() as f32;
        let height = frame.height() as f32;

        if self.frames_seen % SPAWN_EVERY_FRAMES == 0 {
            self.spawn(width);
        }
        self.frames_seen += 1;

        for animal in &mut self.animals {
            animal.y += animal.speed;
        }
        self.animals.retain(|animal| animal.y < height);

        let mut detections = Vec::with_capacity(self.animals.len());
        for animal in &self.animals {
            let x2 = (animal.x + ANIMAL_WIDTH).min(width);
            let y2 = (animal.y + ANIMAL_HEIGHT).min(height);
            let Ok(bbox) = BoundingBox::new(animal.x, animal.y, x2, y2) else {
                continue;
            };
            let confidence = self.rng.gen_range(0.6..0.99);
            detections.push(RawDetection::new(
                Some(animal.track_ref),
                bbox,
                animal.class_label,
                confidence,
            ));
        }
        Ok(detections)
    }

    fn reset(&mut self) {
        *self = Self::with_seed(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn herd_is_deterministic_after_reset() {
        let frame = Frame::new(1, RgbImage::new(640, 480));
        let mut backend = HerdBackend::new();
        let first: Vec<_> = (0..30).map(|_| backend.detect(&frame).unwrap()).collect();
        backend.reset();
        let second: Vec<_> = (0..30).map(|_| backend.detect(&frame).unwrap()).collect();
        assert_eq!(first, second);
        assert!(first.iter().any(|dets| !dets.is_empty()));
    }

    #[test]
    fn herd_boxes_stay_inside_frame() {
        let frame = Frame::new(1, RgbImage::new(320, 240));
        let mut backend = HerdBackend::with_seed(7);
        for _ in 0..200 {
            for det in backend.detect(&frame).unwrap() {
                assert!(det.bbox.x2 <= 320.0 && det.bbox.y2 <= 240.0);
                assert!(det.track_ref.is_some());
            }
        }
    }
}
