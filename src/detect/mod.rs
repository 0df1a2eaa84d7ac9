//! Detector backends.
//!
//! The detection model is an external collaborator: given a frame, a
//! confidence threshold and a target-class filter, it returns bounding boxes.
//! The call is synchronous and its latency is out of the pipeline's control,
//! which is why it runs on the dedicated inference worker behind bounded
//! queues.

mod stub;

pub use stub::StubDetector;

use anyhow::Result;

use crate::{BoundingBox, Frame};

/// A bounding box as produced by a detector, before zone attribution.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
}

/// Object detector backend.
///
/// Implementations must honor the confidence threshold and return only boxes
/// whose class id is in `class_filter` (an empty filter means all classes).
pub trait Detector: Send {
    /// Backend identifier for logs and reports.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        class_filter: &[u32],
    ) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, called before benchmarking.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
