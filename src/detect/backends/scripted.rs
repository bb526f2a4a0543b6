use std::io::BufRead;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// What happens after the last scripted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptMode {
    /// Every later frame has no detections.
    Once,
    /// Start over from the first scripted frame.
    Cycle,
}

/// Replays a recorded per-frame detection script.
///
/// Used by the replay tool and by tests that need exact control over track
/// references, including adversarial sequences (ID reuse, gaps, untracked boxes).
pub struct ScriptedBackend {
    frames: Vec<Vec<RawDetection>>,
    cursor: usize,
    mode: ScriptMode,
    tracking: bool,
    fail_at: Option<usize>,
}

impl ScriptedBackend {
    pub const NAME: &'static str = "scripted";

    pub fn new(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames,
            cursor: 0,
            mode: ScriptMode::Once,
            tracking: true,
            fail_at: None,
        }
    }

    /// Load a JSON-lines script: one JSON array of detections per frame.
    /// Blank lines are empty frames.
    pub fn from_jsonl(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open detection script {}", path.display()))?;
        let mut frames = Vec::new();
        for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                frames.push(Vec::new());
                continue;
            }
            let detections: Vec<RawDetection> = serde_json::from_str(trimmed).map_err(|e| {
                anyhow!(
                    "invalid detection script {} line {}: {}",
                    path.display(),
                    line_no + 1,
                    e
                )
            })?;
            frames.push(detections);
        }
        Ok(Self::new(frames))
    }

    pub fn with_mode(mut self, mode: ScriptMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mark the backend as unable to track; its detections are never counted.
    pub fn untracked(mut self) -> Self {
        self.tracking = false;
        self
    }

    /// Make `detect` fail on the given zero-based call.
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        match capability {
            DetectionCapability::ObjectDetection => true,
            DetectionCapability::Tracking => self.tracking,
        }
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        let call = self.cursor;
        self.cursor += 1;
        if self.fail_at == Some(call) {
            return Err(anyhow!("scripted detector failure at call {}", call));
        }
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let slot = match self.mode {
            ScriptMode::Once => call,
            ScriptMode::Cycle => call % self.frames.len(),
        };
        Ok(self.frames.get(slot).cloned().unwrap_or_default())
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}
