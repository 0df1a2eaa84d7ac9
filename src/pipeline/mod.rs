//! Three-stage detection pipeline.
//!
//! Capture, inference and output run as dedicated workers connected by two
//! bounded queues. Both queues drop the newest item when full: under load the
//! pipeline degrades by skipping frames, never by stalling capture or growing
//! memory. Dropped counts are tracked and logged.
//!
//! Shutdown is cooperative. The shared running flag stops the capture worker;
//! closing its sender drains the downstream workers in order, so a `join`
//! after `stop` returns once in-flight frames are finished.

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::alert::AlertDispatcher;
use crate::config::SentineldConfig;
use crate::detect::Detector;
use crate::perf::PerfMonitor;
use crate::render::{Renderer, SoftwareRenderer};
use crate::source::FrameSource;
use crate::zones::ZoneIndex;
use crate::{now_s, Detection, Frame};

const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

const COLOR_INTRUSION: [u8; 3] = [255, 0, 0];
const COLOR_DETECTION: [u8; 3] = [0, 255, 0];
const COLOR_HUD: [u8; 3] = [255, 255, 255];

// -------------------- Settings --------------------

/// The subset of the daemon configuration the pipeline consumes.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub queue_size: usize,
    pub limit_fps: bool,
    pub target_fps: u32,
    pub reconnect_on_failure: bool,
    pub confidence_threshold: f32,
    pub target_classes: Vec<u32>,
    pub save_detection_frames: bool,
    pub detection_frames_dir: PathBuf,
    pub frame_save_interval: u64,
}

impl PipelineSettings {
    pub fn from_config(cfg: &SentineldConfig) -> Self {
        Self {
            queue_size: cfg.system.queue_size,
            limit_fps: cfg.system.limit_fps,
            target_fps: cfg.system.target_fps,
            reconnect_on_failure: cfg.system.reconnect_on_failure,
            confidence_threshold: cfg.model.confidence_threshold,
            target_classes: cfg.model.target_classes.clone(),
            save_detection_frames: cfg.output.save_detection_frames,
            detection_frames_dir: cfg.output.detection_frames_dir.clone(),
            frame_save_interval: cfg.output.frame_save_interval,
        }
    }
}

// -------------------- Counters --------------------

/// Shared pipeline counters, readable while the workers run.
#[derive(Default)]
pub struct PipelineCounters {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub results_dropped: AtomicU64,
    pub alerts_sent: AtomicU64,
}

impl PipelineCounters {
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.frames_captured.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed),
            self.results_dropped.load(Ordering::Relaxed),
            self.alerts_sent.load(Ordering::Relaxed),
        )
    }
}

// -------------------- Pipeline --------------------

/// Owns the collaborators until `spawn` hands them to the workers.
pub struct Pipeline {
    settings: PipelineSettings,
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    zones: Arc<ZoneIndex>,
    dispatcher: Arc<AlertDispatcher>,
    perf: Arc<PerfMonitor>,
}

/// Control handle over a running pipeline.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    counters: Arc<PipelineCounters>,
    workers: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Signal the workers to stop. Returns immediately; pair with `join`.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> &PipelineCounters {
        &self.counters
    }

    /// Wait for every worker to finish.
    pub fn join(self) -> Result<()> {
        for worker in self.workers {
            if worker.join().is_err() {
                anyhow::bail!("pipeline worker panicked");
            }
        }
        Ok(())
    }
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        zones: Arc<ZoneIndex>,
        dispatcher: Arc<AlertDispatcher>,
        perf: Arc<PerfMonitor>,
    ) -> Self {
        Self {
            settings,
            source,
            detector,
            zones,
            dispatcher,
            perf,
        }
    }

    /// Start the three workers. The caller keeps the running flag, typically
    /// wired to a signal handler.
    pub fn spawn(self, running: Arc<AtomicBool>) -> Result<PipelineHandle> {
        let counters = Arc::new(PipelineCounters::default());
        let (frame_tx, frame_rx) = bounded::<Frame>(self.settings.queue_size);
        let (result_tx, result_rx) = bounded::<(Frame, Vec<Detection>)>(self.settings.queue_size);

        let mut workers = Vec::with_capacity(3);

        let capture = CaptureWorker {
            settings: self.settings.clone(),
            source: self.source,
            running: Arc::clone(&running),
            counters: Arc::clone(&counters),
            tx: frame_tx,
        };
        workers.push(
            std::thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || capture.run())?,
        );

        let inference = InferenceWorker {
            settings: self.settings.clone(),
            detector: self.detector,
            zones: Arc::clone(&self.zones),
            perf: Arc::clone(&self.perf),
            running: Arc::clone(&running),
            counters: Arc::clone(&counters),
            rx: frame_rx,
            tx: result_tx,
        };
        workers.push(
            std::thread::Builder::new()
                .name("inference".to_string())
                .spawn(move || inference.run())?,
        );

        let output = OutputWorker {
            settings: self.settings,
            dispatcher: self.dispatcher,
            running: Arc::clone(&running),
            counters: Arc::clone(&counters),
            rx: result_rx,
        };
        workers.push(
            std::thread::Builder::new()
                .name("output".to_string())
                .spawn(move || output.run())?,
        );

        Ok(PipelineHandle {
            running,
            counters,
            workers,
        })
    }
}

// -------------------- Capture --------------------

struct CaptureWorker {
    settings: PipelineSettings,
    source: Box<dyn FrameSource>,
    running: Arc<AtomicBool>,
    counters: Arc<PipelineCounters>,
    tx: Sender<Frame>,
}

impl CaptureWorker {
    fn run(mut self) {
        let frame_budget = if self.settings.limit_fps && self.settings.target_fps > 0 {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.settings.target_fps)))
        } else {
            None
        };

        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            match self.source.next_frame() {
                Ok(frame) => {
                    self.counters.frames_captured.fetch_add(1, Ordering::Relaxed);
                    match self.tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            let dropped =
                                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                            if dropped % 100 == 1 {
                                log::warn!("frame queue full, {} frames dropped so far", dropped);
                            }
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                Err(e) => {
                    log::error!("frame capture failed: {}", e);
                    if self.settings.reconnect_on_failure {
                        if let Err(e) = self.source.reconfigure() {
                            log::error!("source reconnect failed: {}", e);
                        }
                        std::thread::sleep(RECONNECT_DELAY);
                        continue;
                    }
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
            if let Some(budget) = frame_budget {
                let elapsed = started.elapsed();
                if elapsed < budget {
                    std::thread::sleep(budget - elapsed);
                }
            }
        }
        log::info!("capture worker stopped");
        // Dropping tx lets the downstream workers drain and exit.
    }
}

// -------------------- Inference --------------------

struct InferenceWorker {
    settings: PipelineSettings,
    detector: Box<dyn Detector>,
    zones: Arc<ZoneIndex>,
    perf: Arc<PerfMonitor>,
    running: Arc<AtomicBool>,
    counters: Arc<PipelineCounters>,
    rx: Receiver<Frame>,
    tx: Sender<(Frame, Vec<Detection>)>,
}

impl InferenceWorker {
    fn run(mut self) {
        let renderer = SoftwareRenderer::new();
        loop {
            let mut frame = match self.rx.recv_timeout(RECV_TIMEOUT) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => {
                    if self.running.load(Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            self.perf.start_timer();

            // A detector failure skips this frame only; the pipeline stays up.
            let raw = match self.detector.detect(
                &frame,
                self.settings.confidence_threshold,
                &self.settings.target_classes,
            ) {
                Ok(raw) => raw,
                Err(e) => {
                    log::error!("detector failed on frame {}: {}", frame.seq, e);
                    self.perf.stop_timer();
                    continue;
                }
            };

            let timestamp_s = now_s().unwrap_or(frame.captured_at_s);
            let mut intrusions = Vec::new();
            self.zones.render(&mut frame, &renderer);
            for det in &raw {
                let (fx, fy) = det.bbox.feet_anchor();
                match self.zones.locate(fx, fy) {
                    Some(zone_id) => {
                        let caption = format!(
                            "{}: {:.2} - INTRUSION in {}",
                            det.class_name, det.confidence, zone_id
                        );
                        draw_detection(&renderer, &mut frame, det, &caption, COLOR_INTRUSION);
                        renderer.draw_marker(&mut frame, fx as i32, fy as i32, 4, COLOR_INTRUSION);
                        intrusions.push(Detection {
                            class_name: det.class_name.clone(),
                            class_id: det.class_id,
                            confidence: det.confidence,
                            zone_id,
                            timestamp_s,
                            bbox: det.bbox,
                        });
                    }
                    None => {
                        let caption = format!("{}: {:.2}", det.class_name, det.confidence);
                        draw_detection(&renderer, &mut frame, det, &caption, COLOR_DETECTION);
                    }
                }
            }
            let hud = format!("FPS: {:.1}", self.perf.fps());
            renderer.draw_text(&mut frame, &hud, 10, 10, COLOR_HUD);

            self.perf.stop_timer();

            match self.tx.try_send((frame, intrusions)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.counters.results_dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("result queue full, dropping annotated frame");
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        log::info!("inference worker stopped");
    }
}

fn draw_detection(
    renderer: &SoftwareRenderer,
    frame: &mut Frame,
    det: &crate::detect::RawDetection,
    caption: &str,
    color: [u8; 3],
) {
    let bbox = det.bbox;
    renderer.draw_box(frame, bbox.x1, bbox.y1, bbox.x2, bbox.y2, color);
    renderer.draw_text(frame, caption, bbox.x1, bbox.y1 - 10, color);
}

// -------------------- Output --------------------

struct OutputWorker {
    settings: PipelineSettings,
    dispatcher: Arc<AlertDispatcher>,
    running: Arc<AtomicBool>,
    counters: Arc<PipelineCounters>,
    rx: Receiver<(Frame, Vec<Detection>)>,
}

impl OutputWorker {
    fn run(self) {
        let mut detection_frames: u64 = 0;
        loop {
            let (frame, detections) = match self.rx.recv_timeout(RECV_TIMEOUT) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => {
                    if self.running.load(Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if detections.is_empty() {
                continue;
            }

            for det in &detections {
                log::info!(
                    "intrusion: {} in {} (confidence {:.2})",
                    det.class_name,
                    det.zone_id,
                    det.confidence
                );
            }

            match self.dispatcher.maybe_dispatch(&detections, &frame) {
                Ok(true) => {
                    self.counters.alerts_sent.fetch_add(1, Ordering::Relaxed);
                    log::info!("Alert sent for {} intrusions", detections.len());
                }
                Ok(false) => {}
                Err(e) => log::error!("alert dispatch failed: {}", e),
            }

            detection_frames += 1;
            if self.settings.save_detection_frames
                && (detection_frames - 1) % self.settings.frame_save_interval == 0
            {
                if let Err(e) = self.save_detection_frame(&frame, &detections) {
                    log::error!("failed to save detection frame: {}", e);
                }
            }
        }
        log::info!("output worker stopped");
    }

    /// Write `intrusion_<ts>_<seq>.jpg` plus the detection record sidecar.
    fn save_detection_frame(&self, frame: &Frame, detections: &[Detection]) -> Result<()> {
        std::fs::create_dir_all(&self.settings.detection_frames_dir)?;
        let stem = format!("intrusion_{}_{}", now_s()?, frame.seq);
        let image_path = self
            .settings
            .detection_frames_dir
            .join(format!("{}.jpg", stem));
        std::fs::write(&image_path, frame.to_jpeg()?)?;
        let meta_path = self
            .settings
            .detection_frames_dir
            .join(format!("{}.json", stem));
        std::fs::write(&meta_path, serde_json::to_string_pretty(detections)?)?;
        log::debug!("detection frame saved to {}", image_path.display());
        Ok(())
    }
}
