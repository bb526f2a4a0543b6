//! Per-connection sessions.
//!
//! - `config`: the shared, atomically swapped session config
//! - `protocol`: control messages and server events
//! - `pipeline`: the stream task that runs one session's frames
//! - `controller`: start / reconfigure / stop with cancel-and-await

mod config;
mod controller;
mod pipeline;
pub mod protocol;

pub use config::{SessionConfig, SharedConfig};
pub use controller::{ControllerSettings, SessionController};
pub use pipeline::{CancelToken, PipelineSettings, SessionReport};
pub use protocol::{ControlMessage, ServerEvent};
