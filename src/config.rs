use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::count::CountPolicy;
use crate::ingest::SourceSettings;
use crate::session::{ControllerSettings, PipelineSettings};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";
const DEFAULT_DETECTOR: &str = "scripted-herd";
const DEFAULT_CAMERA: &str = "stub://pasture";
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 15;
const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Deserialize, Default)]
struct CounterdConfigFile {
    server: Option<ServerConfigFile>,
    detection: Option<DetectionConfigFile>,
    video: Option<VideoConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    listen_addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    detector: Option<String>,
    target_class: Option<String>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    cameras: Option<Vec<String>>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct CounterdConfig {
    pub listen_addr: String,
    pub detector: String,
    pub policy: CountPolicy,
    pub video: VideoSettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    /// Sources selectable by integer `camera` index.
    pub cameras: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// Pacing for synthetic sources; 0 means unpaced.
    pub target_fps: u32,
    pub jpeg_quality: u8,
}

impl VideoSettings {
    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            cameras: self.cameras.clone(),
            width: self.width,
            height: self.height,
            target_fps: self.target_fps,
        }
    }
}

impl Default for CounterdConfig {
    fn default() -> Self {
        // The empty file has no required fields, so this cannot fail.
        Self::from_file(CounterdConfigFile::default())
    }
}

impl CounterdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FLOCK_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Settings each connection's session controller starts from.
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            detector: self.detector.clone(),
            policy: self.policy.clone(),
            source: self.video.source_settings(),
            pipeline: PipelineSettings {
                jpeg_quality: self.video.jpeg_quality,
                ..PipelineSettings::default()
            },
        }
    }

    fn from_file(file: CounterdConfigFile) -> Self {
        let listen_addr = file
            .server
            .and_then(|server| server.listen_addr)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let detection = file.detection.unwrap_or_default();
        let video = file.video.unwrap_or_default();
        let policy = CountPolicy::default();
        Self {
            listen_addr,
            detector: detection
                .detector
                .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
            policy: CountPolicy {
                target_class: detection
                    .target_class
                    .unwrap_or(policy.target_class),
                min_confidence: detection.min_confidence.unwrap_or(policy.min_confidence),
            },
            video: VideoSettings {
                cameras: video
                    .cameras
                    .unwrap_or_else(|| vec![DEFAULT_CAMERA.to_string()]),
                width: video.width.unwrap_or(DEFAULT_FRAME_WIDTH),
                height: video.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
                target_fps: video.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                jpeg_quality: video.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("FLOCK_LISTEN_ADDR") {
            if !addr.trim().is_empty() {
                self.listen_addr = addr;
            }
        }
        if let Ok(detector) = std::env::var("FLOCK_DETECTOR") {
            if !detector.trim().is_empty() {
                self.detector = detector.trim().to_string();
            }
        }
        if let Ok(class) = std::env::var("FLOCK_TARGET_CLASS") {
            if !class.trim().is_empty() {
                self.policy.target_class = class.trim().to_string();
            }
        }
        if let Ok(conf) = std::env::var("FLOCK_MIN_CONFIDENCE") {
            self.policy.min_confidence = conf
                .trim()
                .parse()
                .map_err(|_| anyhow!("FLOCK_MIN_CONFIDENCE must be a number"))?;
        }
        if let Ok(cameras) = std::env::var("FLOCK_CAMERAS") {
            let parsed = split_csv(&cameras);
            if !parsed.is_empty() {
                self.video.cameras = parsed;
            }
        }
        if let Ok(width) = std::env::var("FLOCK_FRAME_WIDTH") {
            self.video.width = width
                .trim()
                .parse()
                .map_err(|_| anyhow!("FLOCK_FRAME_WIDTH must be an integer"))?;
        }
        if let Ok(height) = std::env::var("FLOCK_FRAME_HEIGHT") {
            self.video.height = height
                .trim()
                .parse()
                .map_err(|_| anyhow!("FLOCK_FRAME_HEIGHT must be an integer"))?;
        }
        if let Ok(quality) = std::env::var("FLOCK_JPEG_QUALITY") {
            self.video.jpeg_quality = quality
                .trim()
                .parse()
                .map_err(|_| anyhow!("FLOCK_JPEG_QUALITY must be an integer in 1..=100"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.policy.min_confidence) {
            return Err(anyhow!("min_confidence must be within [0, 1]"));
        }
        if self.policy.target_class.trim().is_empty() {
            return Err(anyhow!("target_class must not be empty"));
        }
        if !(1..=100).contains(&self.video.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be within 1..=100"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        if self.video.cameras.is_empty() {
            return Err(anyhow!("at least one camera must be configured"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CounterdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
