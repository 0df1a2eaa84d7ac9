use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use zone_sentinel::detect::RawDetection;
use zone_sentinel::pipeline::{Pipeline, PipelineHandle, PipelineSettings};
use zone_sentinel::{
    AlertDispatcher, BoundingBox, Detector, Frame, PerfMonitor, StubDetector, SyntheticSource,
    ZoneIndex,
};

/// Detector that takes a fixed time per frame, to build queue pressure.
struct SlowDetector {
    delay: Duration,
}

impl Detector for SlowDetector {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn detect(
        &mut self,
        _frame: &Frame,
        _confidence_threshold: f32,
        _class_filter: &[u32],
    ) -> Result<Vec<RawDetection>> {
        std::thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

fn settings(dir: &TempDir, queue_size: usize) -> PipelineSettings {
    PipelineSettings {
        queue_size,
        limit_fps: false,
        target_fps: 0,
        reconnect_on_failure: false,
        confidence_threshold: 0.5,
        target_classes: vec![0],
        save_detection_frames: false,
        detection_frames_dir: dir.path().join("frames"),
        frame_save_interval: 15,
    }
}

fn full_frame_zone() -> Arc<ZoneIndex> {
    let zones = ZoneIndex::new();
    zones
        .add(
            "zone1",
            "Main Entrance",
            vec![(0.0, 0.0), (320.0, 0.0), (320.0, 240.0), (0.0, 240.0)],
            [255, 0, 0],
            true,
        )
        .expect("add zone");
    Arc::new(zones)
}

/// Join with a deadline so a wedged worker fails the test instead of
/// hanging it.
fn join_within(handle: PipelineHandle, deadline: Duration) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let result = handle.join();
        let _ = tx.send(result);
    });
    rx.recv_timeout(deadline)
        .expect("pipeline did not shut down in time")
        .expect("worker panicked");
}

#[test]
fn overloaded_pipeline_drops_frames_instead_of_stalling() {
    let dir = TempDir::new().unwrap();
    let dispatcher = AlertDispatcher::new(false, Duration::from_secs(0), dir.path());
    let pipeline = Pipeline::new(
        settings(&dir, 2),
        Box::new(SyntheticSource::new(320, 240)),
        Box::new(SlowDetector {
            delay: Duration::from_millis(50),
        }),
        full_frame_zone(),
        Arc::new(dispatcher),
        Arc::new(PerfMonitor::new()),
    );

    let handle = pipeline.spawn(Arc::new(AtomicBool::new(true))).expect("spawn pipeline");
    std::thread::sleep(Duration::from_millis(500));
    handle.stop();

    let (captured, dropped, _, _) = handle.counters().snapshot();
    // Capture runs unthrottled against a 50ms detector and a queue of 2:
    // most frames must have been dropped, and capture never blocked.
    assert!(captured > 10, "captured only {} frames", captured);
    assert!(dropped > 0, "no frames were dropped under overload");

    join_within(handle, Duration::from_secs(5));
}

#[test]
fn intrusions_leave_alert_artifacts_on_disk() {
    let dir = TempDir::new().unwrap();
    let alerts_dir = dir.path().join("alerts");
    let dispatcher = AlertDispatcher::new(true, Duration::from_secs(3600), &alerts_dir);

    let person = RawDetection {
        bbox: BoundingBox::new(40, 40, 80, 160),
        confidence: 0.9,
        class_id: 0,
        class_name: "person".to_string(),
    };
    let mut settings = settings(&dir, 4);
    settings.limit_fps = true;
    settings.target_fps = 30;

    let pipeline = Pipeline::new(
        settings,
        Box::new(SyntheticSource::new(320, 240)),
        Box::new(StubDetector::with_script(vec![vec![person]])),
        full_frame_zone(),
        Arc::new(dispatcher),
        Arc::new(PerfMonitor::new()),
    );

    let handle = pipeline.spawn(Arc::new(AtomicBool::new(true))).expect("spawn pipeline");
    std::thread::sleep(Duration::from_millis(400));
    handle.stop();

    let (_, _, _, alerts) = handle.counters().snapshot();
    assert_eq!(alerts, 1);
    join_within(handle, Duration::from_secs(5));

    let names: Vec<String> = std::fs::read_dir(&alerts_dir)
        .expect("alerts dir")
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("alert_") && n.ends_with(".jpg")));
    assert!(names.iter().any(|n| n.starts_with("alert_") && n.ends_with(".json")));
}

#[test]
fn source_failure_without_reconnect_stops_the_pipeline() {
    struct DeadSource;
    impl zone_sentinel::FrameSource for DeadSource {
        fn next_frame(&mut self) -> Result<Frame> {
            anyhow::bail!("stream gone")
        }
        fn reconfigure(&mut self) -> Result<()> {
            Ok(())
        }
        fn stats(&self) -> zone_sentinel::source::SourceStats {
            zone_sentinel::source::SourceStats::default()
        }
    }

    let dir = TempDir::new().unwrap();
    let dispatcher = AlertDispatcher::new(false, Duration::from_secs(0), dir.path());
    let pipeline = Pipeline::new(
        settings(&dir, 2),
        Box::new(DeadSource),
        Box::new(StubDetector::new()),
        full_frame_zone(),
        Arc::new(dispatcher),
        Arc::new(PerfMonitor::new()),
    );

    let handle = pipeline.spawn(Arc::new(AtomicBool::new(true))).expect("spawn pipeline");
    // The capture worker flips the running flag itself.
    for _ in 0..50 {
        if !handle.is_running() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(!handle.is_running());
    join_within(handle, Duration::from_secs(5));
}
