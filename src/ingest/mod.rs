//! Frame ingestion sources.
//!
//! This module provides the sources a session can stream from:
//! - Synthetic pasture frames (`stub://name?frames=N&fps=N`)
//! - Still images: a directory of `png`/`jpg` files or a single file
//! - Video files and stream URLs (feature: ingest-file-ffmpeg)
//!
//! A client selects a source with the `camera` parameter: an integer indexes the
//! configured camera list, a string is used as the location directly.
//!
//! Every source:
//! - Numbers frames from 1 in capture order
//! - Resizes frames to the configured working resolution
//! - Reports exhaustion as `Ok(None)`, never as an error
//! - Releases its underlying handle on drop

#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
mod images;
mod synthetic;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "ingest-file-ffmpeg")]
use self::file_ffmpeg::FfmpegSource;
use self::images::ImageSequenceSource;
use self::synthetic::SyntheticSource;
use crate::error::SessionError;
use crate::frame::Frame;

/// The `camera` parameter of a start request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    /// Index into the configured camera list.
    Index(u32),
    /// Path, `stub://` name or URL.
    Location(String),
}

impl SourceSpec {
    /// Resolve to a concrete location string.
    pub fn resolve(&self, settings: &SourceSettings) -> Result<String, SessionError> {
        match self {
            SourceSpec::Index(index) => settings
                .cameras
                .get(*index as usize)
                .cloned()
                .ok_or_else(|| {
                    SessionError::SourceUnavailable(format!(
                        "camera index {} is not configured ({} cameras)",
                        index,
                        settings.cameras.len()
                    ))
                }),
            SourceSpec::Location(location) if location.trim().is_empty() => Err(
                SessionError::SourceUnavailable("camera location is empty".to_string()),
            ),
            SourceSpec::Location(location) => Ok(location.clone()),
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Index(index) => write!(f, "camera #{}", index),
            SourceSpec::Location(location) => f.write_str(location),
        }
    }
}

/// Settings shared by all sources of a daemon.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    pub cameras: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// Pacing for synthetic sources; 0 means as fast as possible.
    pub target_fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            cameras: vec!["stub://pasture".to_string()],
            width: 640,
            height: 480,
            target_fps: 15,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

/// An opened frame source.
pub struct FrameSource {
    backend: SourceBackend,
    location: String,
    width: u32,
    height: u32,
    frames_captured: u64,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    Images(ImageSequenceSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegSource),
}

impl FrameSource {
    /// Open the source named by `spec`. Any failure is `SourceUnavailable`.
    pub fn open(spec: &SourceSpec, settings: &SourceSettings) -> Result<Self, SessionError> {
        let location = spec.resolve(settings)?;
        let backend = open_backend(&location, settings)
            .map_err(|e| SessionError::SourceUnavailable(format!("{}: {:#}", location, e)))?;
        log::info!("FrameSource: opened {}", location);
        Ok(Self {
            backend,
            location,
            width: settings.width,
            height: settings.height,
            frames_captured: 0,
        })
    }

    /// Capture the next frame, or `None` when the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let image = match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_image()?,
            SourceBackend::Images(source) => source.next_image()?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.next_image()?,
        };
        let Some(image) = image else {
            return Ok(None);
        };
        self.frames_captured += 1;
        Ok(Some(
            Frame::new(self.frames_captured, image).resized(self.width, self.height),
        ))
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            location: self.location.clone(),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        log::debug!(
            "FrameSource: released {} after {} frames",
            self.location,
            self.frames_captured
        );
    }
}

fn open_backend(location: &str, settings: &SourceSettings) -> Result<SourceBackend> {
    if location.starts_with("stub://") {
        return Ok(SourceBackend::Synthetic(SyntheticSource::open(
            location, settings,
        )?));
    }
    let path = Path::new(location);
    if path.is_dir() || ImageSequenceSource::is_image_path(path) {
        return Ok(SourceBackend::Images(ImageSequenceSource::open(path)?));
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(SourceBackend::Ffmpeg(FfmpegSource::open(location)?))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        anyhow::bail!("video files and stream URLs require the ingest-file-ffmpeg feature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SourceSettings {
        SourceSettings {
            cameras: vec!["stub://zero?frames=2".to_string()],
            width: 64,
            height: 48,
            target_fps: 0,
        }
    }

    #[test]
    fn index_resolves_against_camera_list() {
        let settings = settings();
        assert_eq!(
            SourceSpec::Index(0).resolve(&settings).unwrap(),
            "stub://zero?frames=2"
        );
        assert!(matches!(
            SourceSpec::Index(3).resolve(&settings),
            Err(SessionError::SourceUnavailable(_))
        ));
        assert!(SourceSpec::Location("  ".into()).resolve(&settings).is_err());
    }

    #[test]
    fn spec_parses_from_integer_or_string() {
        let index: SourceSpec = serde_json::from_str("2").unwrap();
        assert_eq!(index, SourceSpec::Index(2));
        let path: SourceSpec = serde_json::from_str(r#""/data/herd.mp4""#).unwrap();
        assert_eq!(path, SourceSpec::Location("/data/herd.mp4".into()));
    }

    #[test]
    fn synthetic_source_numbers_and_exhausts() {
        let mut source = FrameSource::open(&SourceSpec::Index(0), &settings()).unwrap();
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!((first.width(), first.height()), (64, 48));
        assert_eq!(source.next_frame().unwrap().unwrap().index, 2);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 2);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let result = FrameSource::open(
            &SourceSpec::Location("/definitely/not/here.mp4".into()),
            &settings(),
        );
        assert!(matches!(result, Err(SessionError::SourceUnavailable(_))));
    }
}
