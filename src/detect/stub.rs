//! Scripted stub detector for development and tests.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Detector, RawDetection};
use crate::Frame;

/// Detector that replays a script of per-frame detection lists.
///
/// With an empty script it reports no detections forever. Scripted entries
/// are consumed one per `detect` call; after the script runs out the detector
/// reverts to empty results. `fail_always` turns every call into an error,
/// for exercising the pipeline's per-frame isolation.
pub struct StubDetector {
    script: Arc<Mutex<VecDeque<Vec<RawDetection>>>>,
    fail_always: bool,
    calls: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fail_always: false,
            calls: 0,
        }
    }

    pub fn with_script(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(frames.into())),
            fail_always: false,
            calls: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fail_always: true,
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        _frame: &Frame,
        confidence_threshold: f32,
        class_filter: &[u32],
    ) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        if self.fail_always {
            return Err(anyhow!("stub detector configured to fail"));
        }
        let next = self
            .script
            .lock()
            .expect("stub script lock poisoned")
            .pop_front()
            .unwrap_or_default();
        Ok(next
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .filter(|d| class_filter.is_empty() || class_filter.contains(&d.class_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn person(confidence: f32) -> RawDetection {
        RawDetection {
            bbox: BoundingBox::new(0, 0, 10, 10),
            confidence,
            class_id: 0,
            class_name: "person".to_string(),
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 12], 2, 2, 0, 0)
    }

    #[test]
    fn script_filters_by_confidence_and_class() {
        let mut detector = StubDetector::with_script(vec![vec![person(0.9), person(0.2)]]);
        let hits = detector.detect(&frame(), 0.5, &[0]).unwrap();
        assert_eq!(hits.len(), 1);

        let mut detector = StubDetector::with_script(vec![vec![person(0.9)]]);
        let hits = detector.detect(&frame(), 0.5, &[7]).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn exhausted_script_reports_nothing() {
        let mut detector = StubDetector::with_script(vec![vec![person(0.9)]]);
        detector.detect(&frame(), 0.5, &[]).unwrap();
        assert!(detector.detect(&frame(), 0.5, &[]).unwrap().is_empty());
    }

    #[test]
    fn failing_detector_errors() {
        let mut detector = StubDetector::failing();
        assert!(detector.detect(&frame(), 0.5, &[]).is_err());
    }
}
