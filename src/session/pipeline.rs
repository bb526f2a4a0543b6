//! Frame pipeline: the body of a stream task.
//!
//! Per frame: check cancellation, capture, snapshot the shared config, detect, count
//! and log, check cancellation again, then annotate, encode and write. The config
//! snapshot is taken after capture, so a reconfigure applies to every frame captured
//! after it returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate;
use crate::count::{CountedEntry, FrameOutcome, SessionLog, SessionSummary, TrackingCountEngine};
use crate::detect::{DetectionCapability, DetectorBackend};
use crate::error::{SessionEnd, SessionError};
use crate::ingest::{FrameSource, SourceSpec};
use crate::transport::Transport;

use super::config::SharedConfig;
use super::protocol::{send_event, Ended, FrameEvent, ServerEvent};

const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Cooperative cancellation flag, polled at frame boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub jpeg_quality: u8,
    pub health_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }
}

/// What a finished stream task hands back to its controller.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub summary: SessionSummary,
    pub counted: Vec<CountedEntry>,
}

/// One running session. Owns its source, detector and counting state.
pub(crate) struct StreamTask {
    pub(crate) label: String,
    pub(crate) camera: SourceSpec,
    pub(crate) source: FrameSource,
    pub(crate) detector: Box<dyn DetectorBackend>,
    pub(crate) engine: TrackingCountEngine,
    pub(crate) config: SharedConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cancel: CancelToken,
    pub(crate) settings: PipelineSettings,
}

impl StreamTask {
    /// Run until cancelled, exhausted or failed. The source is released on return.
    pub fn run(mut self) -> SessionReport {
        let mut log = SessionLog::new();
        let end = self.stream(&mut log);
        self.finish(&end);

        let summary = log.summary();
        let level = if end.is_normal() {
            log::Level::Info
        } else {
            log::Level::Warn
        };
        log::log!(
            level,
            "{}: ended ({}) after {} frames, total {} counted, {:.2} avg fps",
            self.label,
            end,
            summary.frames,
            summary.total_counted,
            summary.average_fps
        );
        SessionReport {
            end,
            summary,
            counted: self.engine.counted().to_vec(),
        }
    }

    fn stream(&mut self, log: &mut SessionLog) -> SessionEnd {
        let tracking = self.detector.supports(DetectionCapability::Tracking);
        let mut last_health = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return SessionEnd::Stopped;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return SessionEnd::Exhausted,
                Err(e) => return SessionEnd::SourceFailed(format!("{:#}", e)),
            };
            let config = self.config.snapshot();

            let outcome = if config.detect {
                match self.detector.detect(&frame) {
                    Ok(detections) => self.engine.process(
                        frame.index,
                        &detections,
                        &config.region,
                        &config.policy,
                        tracking,
                    ),
                    Err(e) => return SessionEnd::DetectorFailed(format!("{:#}", e)),
                }
            } else {
                FrameOutcome::idle(self.engine.total_unique())
            };

            // The engine has counted this frame; the log must agree with its ledger
            // even when the task stops here.
            let counters = outcome.counters;
            log.record(frame.index, &counters);
            if self.cancel.is_cancelled() {
                return SessionEnd::Stopped;
            }

            let captured_at = frame.captured_at;

            let jpeg = match annotate::render(
                frame,
                &outcome,
                &config.region,
                self.settings.jpeg_quality,
            ) {
                Ok(jpeg) => jpeg,
                Err(e) => return SessionEnd::SourceFailed(format!("frame encoding: {:#}", e)),
            };

            if counters.newly_counted_this_frame > 0 {
                let event = ServerEvent::Frame(FrameEvent::new(
                    &self.camera,
                    captured_at,
                    &counters,
                    &jpeg,
                ));
                if let Err(e) = send_event(self.transport.as_ref(), &event) {
                    return SessionEnd::TransportClosed(e.to_string());
                }
            }
            if let Err(e) = self.transport.send_binary(jpeg) {
                return SessionEnd::TransportClosed(e.to_string());
            }

            if last_health.elapsed() >= self.settings.health_interval {
                let summary = log.summary();
                log::info!(
                    "{}: {} frames, {:.1} fps, total {}",
                    self.label,
                    summary.frames,
                    summary.average_fps,
                    summary.total_counted
                );
                last_health = Instant::now();
            }
        }
    }

    /// Tell the client why the session ended, when it did not ask for it.
    fn finish(&self, end: &SessionEnd) {
        let event = match end {
            SessionEnd::Exhausted => {
                ServerEvent::Ended(Ended::new(end, self.engine.total_unique()))
            }
            SessionEnd::DetectorFailed(msg) => {
                ServerEvent::from(&SessionError::DetectorFailure(msg.clone()))
            }
            SessionEnd::SourceFailed(msg) => {
                ServerEvent::from(&SessionError::SourceUnavailable(msg.clone()))
            }
            SessionEnd::Stopped | SessionEnd::TransportClosed(_) | SessionEnd::Panicked => return,
        };
        if let Err(e) = send_event(self.transport.as_ref(), &event) {
            log::warn!("{}: could not report session end: {}", self.label, e);
        }
    }
}
