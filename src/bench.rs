//! Offline benchmark mode.
//!
//! Runs the capture/detect/attribute path single-threaded, without queues or
//! alerting, so the numbers reflect the detector and the zone index rather
//! than scheduling. Warm-up frames run first and their samples are discarded;
//! only the measured phase feeds the report.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::detect::Detector;
use crate::now_s;
use crate::perf::PerfMonitor;
use crate::source::FrameSource;
use crate::zones::ZoneIndex;

const DEFAULT_WARMUP_FRAMES: u64 = 30;
const DEFAULT_MEASURED_FRAMES: u64 = 300;

#[derive(Debug, Serialize)]
pub struct PerformanceReport {
    pub fps: f64,
    pub processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub timestamp: u64,
    pub config: serde_json::Value,
    pub performance: PerformanceReport,
    pub system_info: SystemInfo,
    pub frames_processed: u64,
}

impl BenchmarkReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct BenchmarkRunner {
    warmup_frames: u64,
    measured_frames: u64,
    confidence_threshold: f32,
    target_classes: Vec<u32>,
}

impl BenchmarkRunner {
    pub fn new(confidence_threshold: f32, target_classes: Vec<u32>) -> Self {
        Self {
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            measured_frames: DEFAULT_MEASURED_FRAMES,
            confidence_threshold,
            target_classes,
        }
    }

    pub fn with_frames(mut self, warmup: u64, measured: u64) -> Self {
        self.warmup_frames = warmup;
        self.measured_frames = measured;
        self
    }

    /// Run warm-up then measurement and produce the report. `config` is
    /// echoed into the report verbatim so a saved report is self-describing.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        zones: &ZoneIndex,
        perf: &Arc<PerfMonitor>,
        config: serde_json::Value,
    ) -> Result<BenchmarkReport> {
        log::info!(
            "benchmark: {} warm-up frames, {} measured frames, detector {}",
            self.warmup_frames,
            self.measured_frames,
            detector.name()
        );

        detector.warm_up()?;
        for _ in 0..self.warmup_frames {
            self.step(source, detector, zones, perf)?;
        }
        perf.reset();

        for _ in 0..self.measured_frames {
            self.step(source, detector, zones, perf)?;
        }

        let memory = perf.memory_mb();
        let temperature = perf.temperature_c();
        Ok(BenchmarkReport {
            timestamp: now_s()?,
            config,
            performance: PerformanceReport {
                fps: perf.fps(),
                processing_time_ms: perf.process_time_ms(),
                memory_usage_mb: (memory > 0.0).then_some(memory),
                temperature_c: (temperature > 0.0).then_some(temperature),
            },
            system_info: SystemInfo {
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
                cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            },
            frames_processed: self.measured_frames,
        })
    }

    fn step(
        &self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        zones: &ZoneIndex,
        perf: &Arc<PerfMonitor>,
    ) -> Result<()> {
        let frame = source.next_frame()?;
        perf.start_timer();
        let raw = detector.detect(&frame, self.confidence_threshold, &self.target_classes)?;
        for det in &raw {
            let (fx, fy) = det.bbox.feet_anchor();
            let _ = zones.locate(fx, fy);
        }
        perf.stop_timer();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubDetector;
    use crate::source::SyntheticSource;
    use tempfile::TempDir;

    #[test]
    fn benchmark_discards_warmup_and_counts_measured_frames() {
        let mut source = SyntheticSource::new(64, 48);
        let mut detector = StubDetector::new();
        let zones = ZoneIndex::new();
        let perf = Arc::new(PerfMonitor::new());

        let runner = BenchmarkRunner::new(0.5, vec![0]).with_frames(5, 20);
        let report = runner
            .run(
                &mut source,
                &mut detector,
                &zones,
                &perf,
                serde_json::json!({"source": "synthetic"}),
            )
            .unwrap();

        assert_eq!(report.frames_processed, 20);
        assert_eq!(detector.calls(), 25);
        assert!(report.performance.processing_time_ms >= 0.0);
    }

    #[test]
    fn report_serializes_and_saves() {
        let dir = TempDir::new().unwrap();
        let report = BenchmarkReport {
            timestamp: 1_700_000_000,
            config: serde_json::json!({"queue_size": 10}),
            performance: PerformanceReport {
                fps: 12.5,
                processing_time_ms: 40.0,
                memory_usage_mb: None,
                temperature_c: None,
            },
            system_info: SystemInfo {
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
                cpus: 4,
            },
            frames_processed: 300,
        };
        let path = dir.path().join("reports/bench.json");
        report.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["frames_processed"], 300);
        assert!(value["performance"].get("memory_usage_mb").is_none());
    }
}
