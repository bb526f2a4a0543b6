//! Control-plane messages and server events.
//!
//! Requests arrive as JSON text frames tagged by `type`:
//!
//! - `{"type":"video","params":{"camera":0,"detect":true,"area":[[x,y],...]}}`
//! - `{"type":"configure","params":{"area":null,"line_y":300,"detect":false}}`
//! - `{"type":"stop"}`
//!
//! `area` absent keeps the current region; `null` or `[]` selects the whole frame.
//! Each annotated frame goes out as a binary JPEG payload, preceded by a `frame` JSON
//! event when that frame produced at least one new count.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::count::{InclusionRegion, SessionCounters};
use crate::error::{SessionEnd, SessionError};
use crate::ingest::SourceSpec;
use crate::transport::Transport;
use crate::Point;

// -------------------- Requests --------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Video { params: VideoParams },
    Configure { params: ConfigureParams },
    Stop,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VideoParams {
    pub camera: SourceSpec,
    #[serde(default = "default_detect")]
    pub detect: bool,
    #[serde(default, deserialize_with = "present")]
    pub area: Option<Option<Vec<[f32; 2]>>>,
    #[serde(default)]
    pub line_y: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ConfigureParams {
    #[serde(default)]
    pub detect: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub area: Option<Option<Vec<[f32; 2]>>>,
    #[serde(default)]
    pub line_y: Option<f32>,
}

fn default_detect() -> bool {
    true
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ControlMessage {
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        serde_json::from_str(text).map_err(|e| SessionError::MalformedControlMessage(e.to_string()))
    }
}

impl VideoParams {
    pub fn region(&self) -> Result<Option<InclusionRegion>, SessionError> {
        region_update(self.area.as_ref(), self.line_y)
    }
}

impl ConfigureParams {
    pub fn region(&self) -> Result<Option<InclusionRegion>, SessionError> {
        region_update(self.area.as_ref(), self.line_y)
    }
}

/// Region requested by a message, or `None` to keep the current one.
fn region_update(
    area: Option<&Option<Vec<[f32; 2]>>>,
    line_y: Option<f32>,
) -> Result<Option<InclusionRegion>, SessionError> {
    let vertices = match area {
        None => None,
        Some(None) => Some(&[][..]),
        Some(Some(vertices)) => Some(vertices.as_slice()),
    };

    match (vertices, line_y) {
        (Some(vertices), Some(_)) if !vertices.is_empty() => Err(
            SessionError::MalformedControlMessage("area and line_y are mutually exclusive".into()),
        ),
        (_, Some(y)) => InclusionRegion::line(y)
            .map(Some)
            .map_err(|e| SessionError::MalformedControlMessage(e.to_string())),
        (Some([]), None) => Ok(Some(InclusionRegion::WholeFrame)),
        (Some(vertices), None) => {
            let points: Vec<Point> = vertices.iter().map(|[x, y]| Point::new(*x, *y)).collect();
            InclusionRegion::area(&points)
                .map(Some)
                .map_err(|e| SessionError::MalformedControlMessage(format!("area: {}", e)))
        }
        (None, None) => Ok(None),
    }
}

// -------------------- Events --------------------

/// Everything the server sends as a JSON text frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerEvent {
    Ack(Ack),
    Ended(Ended),
    Error(ErrorEvent),
    Frame(FrameEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ack {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<SourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Vec<[f32; 2]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_y: Option<f32>,
}

impl Ack {
    pub fn camera_set(camera: SourceSpec, detect: bool, region: &InclusionRegion) -> Self {
        Self {
            camera: Some(camera),
            ..Self::with_region("camera_set", detect, region)
        }
    }

    pub fn configured(detect: bool, region: &InclusionRegion) -> Self {
        Self::with_region("configured", detect, region)
    }

    pub fn stopped() -> Self {
        Self {
            status: "stopped",
            camera: None,
            detect: None,
            mode: None,
            area: None,
            line_y: None,
        }
    }

    fn with_region(status: &'static str, detect: bool, region: &InclusionRegion) -> Self {
        let (area, line_y) = match region {
            InclusionRegion::WholeFrame => (None, None),
            InclusionRegion::Area(hull) => (
                Some(hull.vertices().iter().map(|p| [p.x, p.y]).collect()),
                None,
            ),
            InclusionRegion::Line { y } => (None, Some(*y)),
        };
        Self {
            status,
            camera: None,
            detect: Some(detect),
            mode: Some(region.kind().as_str()),
            area,
            line_y,
        }
    }
}

/// Sent by the stream task when its source runs out of frames.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ended {
    pub status: &'static str,
    pub reason: &'static str,
    pub total: u64,
}

impl Ended {
    pub fn new(end: &SessionEnd, total: u64) -> Self {
        Self {
            status: "ended",
            reason: end.as_str(),
            total,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub error: String,
    pub kind: &'static str,
}

impl From<&SessionError> for ErrorEvent {
    fn from(err: &SessionError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// Sent before the binary payload of a frame that produced new counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// The `camera` value the session was started with.
    pub camera_id: SourceSpec,
    pub timestamp: String,
    pub new_detections: bool,
    /// Base64 JPEG, the same bytes as the binary payload that follows.
    pub image: String,
    pub total: u64,
    pub visible: u32,
    pub new: u32,
}

impl FrameEvent {
    pub fn new(
        camera_id: &SourceSpec,
        captured_at: DateTime<Utc>,
        counters: &SessionCounters,
        jpeg: &[u8],
    ) -> Self {
        Self {
            event_type: "frame",
            camera_id: camera_id.clone(),
            timestamp: captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            new_detections: counters.newly_counted_this_frame > 0,
            image: BASE64.encode(jpeg),
            total: counters.total_unique,
            visible: counters.visible_this_frame,
            new: counters.newly_counted_this_frame,
        }
    }
}

impl From<Ack> for ServerEvent {
    fn from(ack: Ack) -> Self {
        ServerEvent::Ack(ack)
    }
}

impl From<&SessionError> for ServerEvent {
    fn from(err: &SessionError) -> Self {
        ServerEvent::Error(ErrorEvent::from(err))
    }
}

/// Serialize an event and send it as a text frame.
pub fn send_event(transport: &dyn Transport, event: &ServerEvent) -> Result<(), SessionError> {
    let text = serde_json::to_string(event)
        .map_err(|e| SessionError::TransportDisconnected(format!("event encoding: {}", e)))?;
    transport.send_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn parses_video_request() {
        let msg = ControlMessage::parse(
            r#"{"type":"video","params":{"camera":0,"detect":true,"area":[[0,0],[10,0],[10,10]]}}"#,
        )
        .unwrap();
        let ControlMessage::Video { params } = msg else {
            panic!("expected video request");
        };
        assert_eq!(params.camera, SourceSpec::Index(0));
        assert_eq!(params.region().unwrap().unwrap().kind().as_str(), "area");
    }

    #[test]
    fn area_absent_null_and_empty_are_distinct() {
        let absent: VideoParams = serde_json::from_value(json!({"camera": "a"})).unwrap();
        assert!(absent.detect);
        assert_eq!(absent.region().unwrap(), None);

        let null: VideoParams =
            serde_json::from_value(json!({"camera": "a", "area": null})).unwrap();
        assert_eq!(null.region().unwrap(), Some(InclusionRegion::WholeFrame));

        let empty: ConfigureParams = serde_json::from_value(json!({"area": []})).unwrap();
        assert_eq!(empty.region().unwrap(), Some(InclusionRegion::WholeFrame));
    }

    #[test]
    fn rejects_bad_regions() {
        let too_few: ConfigureParams =
            serde_json::from_value(json!({"area": [[0, 0], [1, 1]]})).unwrap();
        assert!(matches!(
            too_few.region(),
            Err(SessionError::MalformedControlMessage(_))
        ));

        let both: ConfigureParams =
            serde_json::from_value(json!({"area": [[0, 0], [9, 0], [9, 9]], "line_y": 4}))
                .unwrap();
        assert!(both.region().is_err());
    }

    #[test]
    fn malformed_messages_are_reported() {
        for text in [
            "not json",
            r#"{"type":"dance"}"#,
            r#"{"type":"video","params":{}}"#,
            r#"{"params":{"camera":0}}"#,
        ] {
            assert!(matches!(
                ControlMessage::parse(text),
                Err(SessionError::MalformedControlMessage(_))
            ));
        }
        assert_eq!(
            ControlMessage::parse(r#"{"type":"stop"}"#).unwrap(),
            ControlMessage::Stop
        );
    }

    #[test]
    fn events_serialize_to_wire_shape() {
        let ack = ServerEvent::from(Ack::camera_set(
            SourceSpec::Index(1),
            true,
            &InclusionRegion::line(300.0).unwrap(),
        ));
        let value: Value = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            value,
            json!({"status":"camera_set","camera":1,"detect":true,"mode":"line","line_y":300.0})
        );

        let stopped = serde_json::to_value(ServerEvent::from(Ack::stopped())).unwrap();
        assert_eq!(stopped, json!({"status": "stopped"}));

        let ended = ServerEvent::Ended(Ended::new(&SessionEnd::Exhausted, 7));
        assert_eq!(
            serde_json::to_value(&ended).unwrap(),
            json!({"status":"ended","reason":"source_exhausted","total":7})
        );

        let err = SessionError::DetectorFailure("boom".into());
        let value = serde_json::to_value(ServerEvent::from(&err)).unwrap();
        assert_eq!(value["kind"], "detector_failure");
    }

    #[test]
    fn frame_event_carries_counters_and_image() {
        let counters = SessionCounters {
            visible_this_frame: 3,
            total_unique: 9,
            newly_counted_this_frame: 2,
        };
        let camera = SourceSpec::Location("stub://gate".into());
        let event = FrameEvent::new(&camera, Utc::now(), &counters, &[1, 2, 3]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "frame");
        assert_eq!(value["camera_id"], "stub://gate");
        assert_eq!(value["new_detections"], true);
        assert_eq!(value["image"], "AQID");
        assert_eq!(value["total"], 9);
        assert_eq!(value["new"], 2);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
