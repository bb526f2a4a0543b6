use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Produces bounding boxes with class labels.
    ObjectDetection,
    /// Assigns track references that persist across frames.
    Tracking,
}

/// Detector backend trait (the detection adapter boundary).
///
/// One instance serves one stream task at a time. Anything shared between instances
/// (model weights, device handles) must be stateless across calls or internally
/// synchronized.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    ///
    /// Backends without `Tracking` produce detections that are never counted, since
    /// they cannot be deduplicated.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection (and tracking, if supported) on one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Forget tracker state. Called before the first frame of a new session.
    fn reset(&mut self) {}

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
