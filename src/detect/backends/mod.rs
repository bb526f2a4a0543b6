pub mod herd;
pub mod scripted;

pub use herd::HerdBackend;
pub use scripted::{ScriptMode, ScriptedBackend};
