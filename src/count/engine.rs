use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::region::InclusionRegion;
use super::remap::{IdentityRemapper, SessionId};
use crate::detect::RawDetection;
use crate::{BoundingBox, Point};

const DEFAULT_TARGET_CLASS: &str = "sheep";
const DEFAULT_MIN_CONFIDENCE: f32 = 0.82;

/// Which detections are eligible for counting at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountPolicy {
    pub target_class: String,
    pub min_confidence: f32,
}

impl Default for CountPolicy {
    fn default() -> Self {
        Self {
            target_class: DEFAULT_TARGET_CLASS.to_string(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl CountPolicy {
    fn admits(&self, det: &RawDetection) -> bool {
        // Written so that NaN confidences are rejected.
        det.class_label == self.target_class && det.confidence >= self.min_confidence
    }
}

/// Counters reported for one processed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    /// Detections that passed the class/confidence filter, tracked or not.
    pub visible_this_frame: u32,
    /// Unique objects counted since the session started. Never decreases.
    pub total_unique: u64,
    /// New counts made on this frame.
    pub newly_counted_this_frame: u32,
}

/// A detection that passed the class/confidence filter, with its counting verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedDetection {
    /// `None` for untrackable detections.
    pub session_id: Option<SessionId>,
    pub bbox: BoundingBox,
    pub reference: Point,
    pub class_label: String,
    pub confidence: f32,
    /// False when the detection has no track reference or the detector cannot track.
    /// Untrackable detections are visible but never counted.
    pub trackable: bool,
    pub included: bool,
    pub is_new: bool,
}

/// Result of processing one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutcome {
    pub detections: Vec<AnnotatedDetection>,
    /// Boxes of the target class rejected by the confidence threshold (drawn, not counted).
    pub below_threshold: Vec<BoundingBox>,
    pub counters: SessionCounters,
}

impl FrameOutcome {
    /// Outcome for a frame streamed without detection.
    pub fn idle(total_unique: u64) -> Self {
        Self {
            counters: SessionCounters {
                total_unique,
                ..SessionCounters::default()
            },
            ..Self::default()
        }
    }

    pub fn new_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.detections
            .iter()
            .filter(|det| det.is_new)
            .filter_map(|det| det.session_id)
    }
}

/// Ledger row: which session id was counted, and on which frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CountedEntry {
    pub session_id: SessionId,
    pub frame: u64,
    pub confidence: f32,
}

#[derive(Debug, Default)]
struct TrackState {
    last_y: Option<f32>,
    counted: bool,
}

/// Deduplicating counter for one session.
///
/// Owns the remap table, per-track state and counted ledger. A new engine (or
/// `reset`) is a new session: everything starts from zero.
#[derive(Debug, Default)]
pub struct TrackingCountEngine {
    remapper: IdentityRemapper,
    tracks: HashMap<SessionId, TrackState>,
    total_unique: u64,
    counted: Vec<CountedEntry>,
    frames_processed: u64,
}

impl TrackingCountEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one frame's detections.
    ///
    /// `tracking` is the detector's tracking capability; when false every detection
    /// is treated as untrackable.
    pub fn process(
        &mut self,
        frame_index: u64,
        detections: &[RawDetection],
        region: &InclusionRegion,
        policy: &CountPolicy,
        tracking: bool,
    ) -> FrameOutcome {
        self.frames_processed += 1;
        let mut outcome = FrameOutcome::idle(self.total_unique);

        for det in detections {
            if !policy.admits(det) {
                if det.class_label == policy.target_class {
                    outcome.below_threshold.push(det.bbox);
                }
                continue;
            }

            outcome.counters.visible_this_frame += 1;
            let reference = det.bbox.center();

            let track_ref = if tracking { det.track_ref } else { None };
            let Some(track_ref) = track_ref else {
                outcome.detections.push(AnnotatedDetection {
                    session_id: None,
                    bbox: det.bbox,
                    reference,
                    class_label: det.class_label.clone(),
                    confidence: det.confidence,
                    trackable: false,
                    included: region.includes(reference, None),
                    is_new: false,
                });
                continue;
            };

            let session_id = self.remapper.remap(track_ref);
            let state = self.tracks.entry(session_id).or_default();
            let included = region.includes(reference, state.last_y);
            let is_new = included && !state.counted;
            state.last_y = Some(reference.y);

            if is_new {
                state.counted = true;
                self.total_unique += 1;
                outcome.counters.newly_counted_this_frame += 1;
                self.counted.push(CountedEntry {
                    session_id,
                    frame: frame_index,
                    confidence: det.confidence,
                });
                log::info!(
                    "({}) new id {} conf={:.2} region={}",
                    self.total_unique,
                    session_id,
                    det.confidence,
                    region.kind().as_str()
                );
            }

            outcome.detections.push(AnnotatedDetection {
                session_id: Some(session_id),
                bbox: det.bbox,
                reference,
                class_label: det.class_label.clone(),
                confidence: det.confidence,
                trackable: true,
                included,
                is_new,
            });
        }

        outcome.counters.total_unique = self.total_unique;
        outcome
    }

    pub fn total_unique(&self) -> u64 {
        self.total_unique
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Counted session ids in the order they were counted.
    pub fn counted(&self) -> &[CountedEntry] {
        &self.counted
    }

    pub fn remapper(&self) -> &IdentityRemapper {
        &self.remapper
    }

    /// Start a new session in place.
    pub fn reset(&mut self) {
        self.remapper.reset();
        self.tracks.clear();
        self.total_unique = 0;
        self.counted.clear();
        self.frames_processed = 0;
    }
}
