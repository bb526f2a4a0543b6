use std::sync::Arc;
use std::thread::JoinHandle;

use crate::count::{CountPolicy, InclusionRegion, TrackingCountEngine};
use crate::detect::BackendRegistry;
use crate::error::{SessionEnd, SessionError};
use crate::ingest::{FrameSource, SourceSettings, SourceSpec};
use crate::transport::Transport;

use super::config::{SessionConfig, SharedConfig};
use super::pipeline::{CancelToken, PipelineSettings, SessionReport, StreamTask};
use super::protocol::{send_event, Ack, ControlMessage, ServerEvent};

/// Daemon-wide settings every connection's controller starts from.
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Registry name of the detector each session builds.
    pub detector: String,
    pub policy: CountPolicy,
    pub source: SourceSettings,
    pub pipeline: PipelineSettings,
}

struct ActiveTask {
    label: String,
    cancel: CancelToken,
    join: JoinHandle<SessionReport>,
}

/// Owns the single stream task of one connection.
///
/// Calls take `&mut self`, so start/reconfigure/stop are serialized per connection.
/// Start and stop cancel the running task and wait for it to finish before touching
/// session state; dropping the controller does the same.
pub struct SessionController {
    connection: u64,
    transport: Arc<dyn Transport>,
    registry: Arc<BackendRegistry>,
    settings: ControllerSettings,
    config: SharedConfig,
    active: Option<ActiveTask>,
    sessions_started: u64,
    last_report: Option<SessionReport>,
}

impl SessionController {
    pub fn new(
        connection: u64,
        transport: Arc<dyn Transport>,
        registry: Arc<BackendRegistry>,
        settings: ControllerSettings,
    ) -> Self {
        let config = SharedConfig::new(SessionConfig::new(settings.policy.clone()));
        Self {
            connection,
            transport,
            registry,
            settings,
            config,
            active: None,
            sessions_started: 0,
            last_report: None,
        }
    }

    /// True while a stream task has been spawned and not yet joined.
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Report of the most recently joined session.
    pub fn last_report(&self) -> Option<&SessionReport> {
        self.last_report.as_ref()
    }

    /// Start a new session, replacing any running one.
    ///
    /// Counting always starts from zero. `region` of `None` keeps the current region.
    /// If the source or detector cannot be set up the controller stays idle. The
    /// `camera_set` acknowledgement is sent before the first frame.
    pub fn start(
        &mut self,
        source: SourceSpec,
        region: Option<InclusionRegion>,
        detect: bool,
    ) -> Result<Ack, SessionError> {
        self.stop();

        let frames = FrameSource::open(&source, &self.settings.source)?;
        let mut detector = self
            .registry
            .create(&self.settings.detector)
            .map_err(|e| SessionError::DetectorFailure(format!("{:#}", e)))?;
        detector.reset();
        detector
            .warm_up()
            .map_err(|e| SessionError::DetectorFailure(format!("{:#}", e)))?;

        let config = self.config.update(|current| SessionConfig {
            source: Some(source.clone()),
            region: region.unwrap_or_else(|| current.region.clone()),
            detect,
            policy: current.policy.clone(),
        });

        let ack = Ack::camera_set(source.clone(), detect, &config.region);
        send_event(self.transport.as_ref(), &ServerEvent::from(ack.clone()))?;

        self.sessions_started += 1;
        let label = format!("stream-{}-{}", self.connection, self.sessions_started);
        let cancel = CancelToken::new();
        let task = StreamTask {
            label: label.clone(),
            camera: source.clone(),
            source: frames,
            detector,
            engine: TrackingCountEngine::new(),
            config: self.config.clone(),
            transport: self.transport.clone(),
            cancel: cancel.clone(),
            settings: self.settings.pipeline.clone(),
        };
        let join = std::thread::Builder::new()
            .name(label.clone())
            .spawn(move || task.run())
            .map_err(|e| {
                SessionError::SourceUnavailable(format!("failed to spawn stream task: {}", e))
            })?;

        log::info!(
            "{}: started on {} (detect={}, region={})",
            label,
            source,
            detect,
            config.region.kind().as_str()
        );
        self.active = Some(ActiveTask {
            label,
            cancel,
            join,
        });
        Ok(ack)
    }

    /// Replace the supplied fields of the session config without restarting.
    ///
    /// Counters are kept. While idle the change is stored for the next session.
    pub fn reconfigure(&mut self, region: Option<InclusionRegion>, detect: Option<bool>) -> Ack {
        let config = self.config.update(|current| SessionConfig {
            region: region.unwrap_or_else(|| current.region.clone()),
            detect: detect.unwrap_or(current.detect),
            ..current.clone()
        });
        log::info!(
            "connection {}: reconfigured (detect={}, region={})",
            self.connection,
            config.detect,
            config.region.kind().as_str()
        );
        Ack::configured(config.detect, &config.region)
    }

    /// Cancel the running task and wait for it. A no-op while idle.
    pub fn stop(&mut self) -> Option<SessionReport> {
        let active = self.active.take()?;
        active.cancel.cancel();
        Some(self.join(active))
    }

    /// Join a task that ended by itself (exhaustion, failure).
    pub fn reap_finished(&mut self) -> Option<SessionReport> {
        if !self.active.as_ref()?.join.is_finished() {
            return None;
        }
        let active = self.active.take()?;
        Some(self.join(active))
    }

    /// Apply one control message.
    ///
    /// Returns the acknowledgement still to be sent; `start` announces itself.
    pub fn handle(&mut self, message: ControlMessage) -> Result<Option<Ack>, SessionError> {
        match message {
            ControlMessage::Video { params } => {
                let region = params.region()?;
                self.start(params.camera, region, params.detect)?;
                Ok(None)
            }
            ControlMessage::Configure { params } => {
                let region = params.region()?;
                Ok(Some(self.reconfigure(region, params.detect)))
            }
            ControlMessage::Stop => {
                self.stop();
                Ok(Some(Ack::stopped()))
            }
        }
    }

    /// Parse and apply a text control message, returning the reply to send.
    ///
    /// Failures become error events; the connection stays usable.
    pub fn handle_text(&mut self, text: &str) -> Option<ServerEvent> {
        match ControlMessage::parse(text).and_then(|message| self.handle(message)) {
            Ok(ack) => ack.map(ServerEvent::from),
            Err(err) => {
                log::warn!("connection {}: {}", self.connection, err);
                Some(ServerEvent::from(&err))
            }
        }
    }

    /// Stop and dispose. Used on connection teardown, including abrupt disconnects.
    pub fn shutdown(mut self) -> Option<SessionReport> {
        self.stop();
        self.last_report.take()
    }

    fn join(&mut self, active: ActiveTask) -> SessionReport {
        let report = match active.join.join() {
            Ok(report) => report,
            Err(_) => {
                log::error!("{}: stream task panicked", active.label);
                SessionReport {
                    end: SessionEnd::Panicked,
                    summary: Default::default(),
                    counted: Vec::new(),
                }
            }
        };
        log::debug!("{}: joined ({})", active.label, report.end);
        self.last_report = Some(report.clone());
        report
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if active.join.join().is_err() {
                log::error!("{}: stream task panicked during teardown", active.label);
            }
        }
    }
}
