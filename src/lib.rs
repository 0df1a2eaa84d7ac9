//! Zone Sentinel
//!
//! This crate implements a real-time intrusion detection pipeline:
//!
//! 1. **Capture**: frames are pulled from a `FrameSource` and pushed into a
//!    bounded queue. A full queue drops the newest frame; the live feed stays
//!    fresh at the cost of completeness.
//! 2. **Inference**: frames are run through a `Detector`, detections are
//!    attributed to named polygonal zones via their feet anchor point, and the
//!    frame is annotated.
//! 3. **Output**: intrusions are dispatched through cooldown-gated alert
//!    channels, detection frames are persisted on an interval, and rolling
//!    performance metrics are updated.
//!
//! # Module Structure
//!
//! - `config`: JSON configuration with env overrides and built-in defaults
//! - `zones`: zone table, point-in-polygon index, CRUD, persistence
//! - `detect`: detector backend trait + stub backend
//! - `source`: frame sources (synthetic, image directory)
//! - `alert`: cooldown gate and multi-channel alert fan-out
//! - `perf`: rolling FPS/latency/host metrics
//! - `render`: frame annotation primitives
//! - `pipeline`: the three-stage worker coordinator
//! - `bench`: offline benchmark runner and report artifact

use anyhow::Result;
use image::ImageEncoder;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod alert;
pub mod bench;
pub mod config;
pub mod detect;
pub mod perf;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod zones;

pub use alert::{AlertChannel, AlertDispatcher, AlertEvent};
pub use config::SentineldConfig;
pub use detect::{Detector, RawDetection, StubDetector};
pub use perf::PerfMonitor;
pub use pipeline::{Pipeline, PipelineHandle};
pub use render::{Renderer, SoftwareRenderer};
pub use source::{FrameSource, SyntheticSource};
pub use zones::{ZoneDefinition, ZoneIndex};

/// Seconds since the Unix epoch.
pub fn now_s() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

// -------------------- Frames --------------------

/// A captured video frame. RGB8, row-major.
///
/// Frames are owned by the capture stage until enqueued; ownership then
/// transfers through the pipeline and the frame is discarded (or persisted)
/// by the output stage.
#[derive(Clone)]
pub struct Frame {
    /// RGB8 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic sequence number assigned at capture.
    pub seq: u64,
    /// Capture timestamp, seconds since epoch.
    pub captured_at_s: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64, captured_at_s: u64) -> Self {
        debug_assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            data,
            width,
            height,
            seq,
            captured_at_s,
        }
    }

    /// Encode the frame as JPEG for persistence or channel payloads.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut out);
        encoder.write_image(
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("seq", &self.seq)
            .field("captured_at_s", &self.captured_at_s)
            .finish()
    }
}

// -------------------- Detections --------------------

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Bottom-center anchor ("feet position"). Zone containment uses this
    /// point, never the box centroid: an object leaning over a zone boundary
    /// counts only once its feet are inside.
    pub fn feet_anchor(&self) -> (f64, f64) {
        (f64::from(self.x1 + self.x2) / 2.0, f64::from(self.y2))
    }
}

/// A detection attributed to a zone: an intrusion record.
///
/// Serialized as the sidecar record next to alert snapshots and saved
/// detection frames.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub class_id: u32,
    pub confidence: f32,
    pub zone_id: String,
    /// Seconds since epoch at attribution time.
    pub timestamp_s: u64,
    pub bbox: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feet_anchor_is_bottom_center() {
        let bbox = BoundingBox::new(10, 10, 30, 50);
        assert_eq!(bbox.feet_anchor(), (20.0, 50.0));
    }

    #[test]
    fn feet_anchor_is_not_centroid() {
        let bbox = BoundingBox::new(10, 10, 30, 50);
        let (x, y) = bbox.feet_anchor();
        assert_eq!(x, 20.0);
        assert_ne!(y, 30.0);
    }
}
