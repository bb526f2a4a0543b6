use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};

use super::SourceSettings;

/// Synthetic pasture frames for `stub://` locations.
///
/// Query parameters: `frames=N` exhausts after N frames, `fps=N` overrides pacing
/// (`fps=0` is unpaced).
pub(super) struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    frame_interval: Option<Duration>,
    next_due: Option<Instant>,
    frame_count: u64,
}

impl SyntheticSource {
    pub(super) fn open(location: &str, settings: &SourceSettings) -> Result<Self> {
        let rest = location
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("not a stub location"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut frame_limit = None;
        let mut fps = settings.target_fps;
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => {
                    frame_limit = Some(
                        value
                            .parse()
                            .map_err(|_| anyhow!("stub frames must be an integer"))?,
                    )
                }
                "fps" => {
                    fps = value
                        .parse()
                        .map_err(|_| anyhow!("stub fps must be an integer"))?
                }
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }

        Ok(Self {
            name: name.to_string(),
            width: settings.width.max(1),
            height: settings.height.max(1),
            frame_limit,
            frame_interval: (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64)),
            next_due: None,
            frame_count: 0,
        })
    }

    pub(super) fn next_image(&mut self) -> Result<Option<RgbImage>> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            log::debug!("SyntheticSource: {} exhausted", self.name);
            return Ok(None);
        }
        self.pace();
        self.frame_count += 1;
        Ok(Some(self.generate_pasture()))
    }

    fn pace(&mut self) {
        let Some(interval) = self.frame_interval else {
            return;
        };
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.unwrap_or(now).max(now) + interval);
    }

    /// Grass-coloured background with a slow drift so consecutive frames differ.
    fn generate_pasture(&self) -> RgbImage {
        let shift = self.frame_count as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let stripe = ((x + shift) / 16 + y / 24) % 2;
            Rgb([
                54 + (stripe * 10) as u8,
                128 + ((y * 40) / self.height) as u8,
                48,
            ])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(fps: u32) -> SourceSettings {
        SourceSettings {
            cameras: vec![],
            width: 32,
            height: 24,
            target_fps: fps,
        }
    }

    #[test]
    fn parses_query_parameters() {
        let source = SyntheticSource::open("stub://field?frames=3&fps=0", &settings(15)).unwrap();
        assert_eq!(source.name, "field");
        assert_eq!(source.frame_limit, Some(3));
        assert!(source.frame_interval.is_none());

        assert!(SyntheticSource::open("stub://field?bogus=1", &settings(0)).is_err());
        assert!(SyntheticSource::open("stub://field?frames=x", &settings(0)).is_err());
    }

    #[test]
    fn unlimited_source_keeps_producing() {
        let mut source = SyntheticSource::open("stub://field", &settings(0)).unwrap();
        for _ in 0..5 {
            let image = source.next_image().unwrap().unwrap();
            assert_eq!(image.dimensions(), (32, 24));
        }
    }
}
