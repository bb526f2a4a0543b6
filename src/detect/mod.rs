mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::{HerdBackend, ScriptedBackend};
pub use registry::BackendRegistry;
pub use result::{RawDetection, TrackRef};
