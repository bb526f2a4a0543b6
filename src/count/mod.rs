//! Session-scoped counting.
//!
//! - `remap`: detector track references -> small sequential session ids
//! - `region`: the closed set of inclusion regions and their single dispatch point
//! - `engine`: deduplicated running count with per-detection "is new" flags
//! - `session_log`: per-frame session log and summary

mod engine;
mod region;
mod remap;
mod session_log;

pub use engine::{
    AnnotatedDetection, CountPolicy, CountedEntry, FrameOutcome, SessionCounters,
    TrackingCountEngine,
};
pub use region::{ConvexHull, InclusionRegion, RegionKind};
pub use remap::{IdentityRemapper, SessionId};
pub use session_log::{FrameLogEntry, SessionLog, SessionSummary};
