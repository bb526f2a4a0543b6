use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Identifier assigned by the external tracker.
///
/// Only stable within the tracker's own session. Not assumed dense, small or unique
/// over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackRef(pub u64);

/// One detection as produced by a detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// `None` means the detector could not assign a track ("untracked").
    #[serde(rename = "id", default)]
    pub track_ref: Option<TrackRef>,
    pub bbox: BoundingBox,
    #[serde(rename = "class")]
    pub class_label: String,
    #[serde(rename = "conf")]
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(
        track_ref: Option<u64>,
        bbox: BoundingBox,
        class_label: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            track_ref: track_ref.map(TrackRef),
            bbox,
            class_label: class_label.into(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_form_with_and_without_id() {
        let tracked: RawDetection =
            serde_json::from_str(r#"{"id": 5, "bbox": [0, 0, 10, 10], "class": "sheep", "conf": 0.9}"#)
                .unwrap();
        assert_eq!(tracked.track_ref, Some(TrackRef(5)));
        assert_eq!(tracked.class_label, "sheep");

        let untracked: RawDetection =
            serde_json::from_str(r#"{"id": null, "bbox": [0, 0, 10, 10], "class": "sheep", "conf": 0.4}"#)
                .unwrap();
        assert_eq!(untracked.track_ref, None);

        let missing: RawDetection =
            serde_json::from_str(r#"{"bbox": [0, 0, 10, 10], "class": "dog", "conf": 0.4}"#).unwrap();
        assert_eq!(missing.track_ref, None);
    }
}
