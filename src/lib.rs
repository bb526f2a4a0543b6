//! Flock Counter
//!
//! This crate counts livestock crossing a monitored view. An external detector/tracker
//! produces per-frame detections; a session-scoped engine turns that possibly-infinite
//! stream into a monotonic, deduplicated count and exposes it as a live video stream
//! that a remote client can start, reconfigure and stop over a WebSocket.
//!
//! # Architecture
//!
//! Per connection, data flows:
//!
//! control channel -> `SessionController` -> (cancel old task, swap shared config)
//! -> `StreamTask` -> per frame: `FrameSource` -> `DetectorBackend` ->
//! `InclusionRegion` -> `IdentityRemapper` -> `TrackingCountEngine` -> transport.
//!
//! # Module Structure
//!
//! - `frame`: Owned RGB frames with capture metadata
//! - `ingest`: Frame sources (synthetic, still images, FFmpeg files)
//! - `detect`: Detector backends and their registry
//! - `count`: Identity remapping, inclusion regions, the counting engine, session log
//! - `session`: Shared config handle, frame pipeline, session controller, protocol
//! - `annotate`: Drawing and JPEG encoding of processed frames
//! - `transport`: WebSocket server and per-connection transport
//! - Core types: `Point`, `BoundingBox`

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub mod annotate;
pub mod config;
pub mod count;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod session;
pub mod transport;

pub use count::{
    ConvexHull, CountPolicy, CountedEntry, FrameOutcome, IdentityRemapper, InclusionRegion,
    RegionKind, SessionCounters, SessionId, SessionLog, SessionSummary, TrackingCountEngine,
};
pub use detect::{BackendRegistry, DetectionCapability, DetectorBackend, RawDetection, TrackRef};
pub use error::{SessionEnd, SessionError};
pub use frame::Frame;
pub use ingest::{FrameSource, SourceSettings, SourceSpec};
pub use session::{SessionConfig, SessionController, SharedConfig};
pub use transport::{StreamServer, Transport};

// -------------------- Geometry --------------------

/// A point in frame pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in frame pixel space with `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return Err(anyhow!("bounding box coordinates must be finite"));
        }
        if x1 >= x2 || y1 >= y2 {
            return Err(anyhow!(
                "bounding box must satisfy x1 < x2 and y1 < y2 (got {x1},{y1},{x2},{y2})"
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Reference point used for inclusion tests.
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

impl TryFrom<[f32; 4]> for BoundingBox {
    type Error = anyhow::Error;

    fn try_from(value: [f32; 4]) -> Result<Self> {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.x1, value.y1, value.x2, value.y2]
    }
}
