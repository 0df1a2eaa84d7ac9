//! Frame sources.
//!
//! The video decoder is an external collaborator behind the `FrameSource`
//! trait: it yields raw frames and can be asked to reconnect after a fetch
//! failure. Two sources ship with the crate:
//!
//! - `SyntheticSource`: noise frames for development and load testing
//! - `FileSource`: an image directory replayed in order
//!
//! Sources assign the monotonic frame sequence number and the capture
//! timestamp at fetch time.

mod file;
mod synthetic;

pub use file::FileSource;
pub use synthetic::SyntheticSource;

use anyhow::Result;

use crate::Frame;

/// Counters reported by a source for health logging.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub reconnects: u64,
}

/// A stream of video frames.
pub trait FrameSource: Send {
    /// Fetch the next frame. An error means the fetch failed; the capture
    /// stage decides between `reconfigure` and shutdown.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Reopen/reconnect the underlying stream after a failure.
    fn reconfigure(&mut self) -> Result<()>;

    fn stats(&self) -> SourceStats;
}
