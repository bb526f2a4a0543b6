//! Still-image frame source.
//!
//! Plays a directory of `png`/`jpg` files in file-name order, or a single image file,
//! then reports exhaustion. Decoding happens per frame, in memory.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub(super) struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub(super) fn is_image_path(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
    }

    pub(super) fn open(path: &Path) -> Result<Self> {
        let paths = if path.is_dir() {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("failed to list {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && Self::is_image_path(&entry_path) {
                    paths.push(entry_path);
                }
            }
            paths.sort();
            paths
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("{} does not exist", path.display()));
        };

        if paths.is_empty() {
            return Err(anyhow!("{} contains no images", path.display()));
        }
        Ok(Self { paths, cursor: 0 })
    }

    pub(super) fn next_image(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        Ok(Some(image.to_rgb8()))
    }
}
