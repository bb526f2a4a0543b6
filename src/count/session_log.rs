use std::time::Instant;

use serde::Serialize;

use super::engine::SessionCounters;

/// One row of the per-frame session log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameLogEntry {
    pub frame: u64,
    /// Seconds since the session log was created.
    pub total_time: f64,
    pub time_since_last_frame: f64,
    pub visible: u32,
    pub new_in_frame: u32,
    pub total_count: u64,
    /// Instantaneous rate from the gap to the previous frame.
    pub fps: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub total_counted: u64,
    pub elapsed_secs: f64,
    pub average_fps: f64,
}

/// Running per-session statistics.
///
/// Aggregates are always kept; full per-frame history only when requested, since a
/// live stream may never end.
#[derive(Debug)]
pub struct SessionLog {
    started: Instant,
    last: Instant,
    frames: u64,
    total_count: u64,
    fps_sum: f64,
    fps_samples: u64,
    history: Option<Vec<FrameLogEntry>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(started: Instant) -> Self {
        Self {
            started,
            last: started,
            frames: 0,
            total_count: 0,
            fps_sum: 0.0,
            fps_samples: 0,
            history: None,
        }
    }

    pub fn with_history(mut self) -> Self {
        self.history = Some(Vec::new());
        self
    }

    pub fn record(&mut self, frame: u64, counters: &SessionCounters) -> FrameLogEntry {
        self.record_at(Instant::now(), frame, counters)
    }

    pub fn record_at(
        &mut self,
        now: Instant,
        frame: u64,
        counters: &SessionCounters,
    ) -> FrameLogEntry {
        let since_last = now.saturating_duration_since(self.last).as_secs_f64();
        let fps = if since_last > 0.0 {
            1.0 / since_last
        } else {
            0.0
        };
        if since_last > 0.0 {
            self.fps_sum += fps;
            self.fps_samples += 1;
        }
        self.last = now;
        self.frames += 1;
        self.total_count = counters.total_unique;

        let entry = FrameLogEntry {
            frame,
            total_time: round2(now.saturating_duration_since(self.started).as_secs_f64()),
            time_since_last_frame: round2(since_last),
            visible: counters.visible_this_frame,
            new_in_frame: counters.newly_counted_this_frame,
            total_count: counters.total_unique,
            fps: round2(fps),
        };
        if let Some(history) = self.history.as_mut() {
            history.push(entry.clone());
        }
        entry
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn entries(&self) -> &[FrameLogEntry] {
        self.history.as_deref().unwrap_or(&[])
    }

    pub fn summary(&self) -> SessionSummary {
        let average_fps = if self.fps_samples == 0 {
            0.0
        } else {
            self.fps_sum / self.fps_samples as f64
        };
        SessionSummary {
            frames: self.frames,
            total_counted: self.total_count,
            elapsed_secs: round2(self.last.saturating_duration_since(self.started).as_secs_f64()),
            average_fps: round2(average_fps),
        }
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
