//! Image-directory source: replays still frames in filename order.
//!
//! Stands in for a recorded clip when no live camera is attached. The
//! directory is scanned once at open; `reconfigure` rescans, so new files
//! are picked up after a reconnect.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::{now_s, Frame};

pub struct FileSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    loop_playback: bool,
    seq: u64,
    stats: SourceStats,
}

impl FileSource {
    pub fn open(dir: &Path, loop_playback: bool) -> Result<Self> {
        let files = scan_images(dir)?;
        if files.is_empty() {
            return Err(anyhow!("no image files in {}", dir.display()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            loop_playback,
            seq: 0,
            stats: SourceStats::default(),
        })
    }
}

fn scan_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| anyhow!("failed to read {}: {}", dir.display(), e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("jpg") | Some("jpeg") | Some("png")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Frame> {
        if self.cursor >= self.files.len() {
            if !self.loop_playback {
                return Err(anyhow!("end of image sequence"));
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        self.cursor += 1;

        let decoded = image::open(path)
            .map_err(|e| anyhow!("failed to decode {}: {}", path.display(), e))?
            .into_rgb8();
        let (width, height) = decoded.dimensions();
        let frame = Frame::new(decoded.into_raw(), width, height, self.seq, now_s()?);
        self.seq += 1;
        self.stats.frames_captured += 1;
        Ok(frame)
    }

    fn reconfigure(&mut self) -> Result<()> {
        self.files = scan_images(&self.dir)?;
        self.cursor = 0;
        self.stats.reconnects += 1;
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        self.stats.clone()
    }
}
