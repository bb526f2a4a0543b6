//! Transport layer for the streaming daemon.
//!
//! A `Transport` is the write side of one client connection. The control loop and
//! the stream task share it; implementations serialize writes so a text event and a
//! binary frame never interleave on the wire.

mod ws;

pub use ws::{ServerHandle, StreamServer, WsTransport};

use crate::error::SessionError;

pub trait Transport: Send + Sync {
    /// Send one JSON event as a text message.
    fn send_text(&self, text: &str) -> Result<(), SessionError>;

    /// Send one encoded frame as a binary message.
    fn send_binary(&self, payload: Vec<u8>) -> Result<(), SessionError>;
}
