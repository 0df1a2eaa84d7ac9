//! Rolling performance metrics.
//!
//! The inference stage owns the processing timer; the output stage reads the
//! aggregates for display and logging. State lives behind one mutex so the
//! monitor can be shared across stages as an `Arc<PerfMonitor>`.
//!
//! All windows are fixed-capacity FIFOs: when full, the oldest sample is
//! evicted. Aggregates report 0 when no samples exist or the underlying host
//! source is unavailable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

const DEFAULT_MAX_SAMPLES: usize = 100;

const MEMINFO_PATH: &str = "/proc/self/status";
const THERMAL_PATH: &str = "/sys/devices/virtual/thermal/thermal_zone0/temp";

struct PerfState {
    fps_samples: VecDeque<f64>,
    process_times: VecDeque<f64>,
    memory_samples: VecDeque<f64>,
    temperature_samples: VecDeque<f64>,
    last_frame_time: Instant,
    process_start: Option<Instant>,
}

impl PerfState {
    fn new() -> Self {
        Self {
            fps_samples: VecDeque::with_capacity(DEFAULT_MAX_SAMPLES),
            process_times: VecDeque::with_capacity(DEFAULT_MAX_SAMPLES),
            memory_samples: VecDeque::with_capacity(DEFAULT_MAX_SAMPLES),
            temperature_samples: VecDeque::with_capacity(DEFAULT_MAX_SAMPLES),
            last_frame_time: Instant::now(),
            process_start: None,
        }
    }
}

fn push_bounded(window: &mut VecDeque<f64>, max_samples: usize, value: f64) {
    if window.len() >= max_samples {
        window.pop_front();
    }
    window.push_back(value);
}

fn mean(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

/// Rolling-window timing, FPS and host resource statistics.
pub struct PerfMonitor {
    state: Mutex<PerfState>,
    max_samples: usize,
}

impl PerfMonitor {
    pub fn new() -> Self {
        Self::with_max_samples(DEFAULT_MAX_SAMPLES)
    }

    pub fn with_max_samples(max_samples: usize) -> Self {
        Self {
            state: Mutex::new(PerfState::new()),
            max_samples,
        }
    }

    /// Start timing one frame's processing.
    pub fn start_timer(&self) {
        let mut state = self.state.lock().expect("perf lock poisoned");
        state.process_start = Some(Instant::now());
    }

    /// Stop the processing timer and record the duration.
    ///
    /// A stop with no running timer is a no-op, so unmatched calls are
    /// harmless. A valid stop also counts as a frame-completion tick: the
    /// inter-frame interval window and the host samples update here.
    pub fn stop_timer(&self) {
        let mut state = self.state.lock().expect("perf lock poisoned");
        let Some(start) = state.process_start.take() else {
            return;
        };
        let elapsed = start.elapsed().as_secs_f64();
        let max = self.max_samples;
        push_bounded(&mut state.process_times, max, elapsed);

        let now = Instant::now();
        let interval = now.duration_since(state.last_frame_time).as_secs_f64();
        state.last_frame_time = now;
        if interval > 0.0 {
            push_bounded(&mut state.fps_samples, max, 1.0 / interval);
        }

        if let Some(mb) = read_memory_mb() {
            push_bounded(&mut state.memory_samples, max, mb);
        }
        if let Some(celsius) = read_temperature_c() {
            push_bounded(&mut state.temperature_samples, max, celsius);
        }
    }

    /// Record a processing duration directly, in seconds. Used by tests and
    /// by offline benchmarking where wall-clock pacing is irrelevant.
    pub fn record_process_time(&self, seconds: f64) {
        let mut state = self.state.lock().expect("perf lock poisoned");
        let max = self.max_samples;
        push_bounded(&mut state.process_times, max, seconds);
    }

    /// Mean frames per second over the interval window.
    pub fn fps(&self) -> f64 {
        let state = self.state.lock().expect("perf lock poisoned");
        mean(&state.fps_samples)
    }

    /// Mean per-frame processing time in milliseconds.
    pub fn process_time_ms(&self) -> f64 {
        let state = self.state.lock().expect("perf lock poisoned");
        mean(&state.process_times) * 1000.0
    }

    /// Mean resident memory in MB, 0 when the host source is unavailable.
    pub fn memory_mb(&self) -> f64 {
        let state = self.state.lock().expect("perf lock poisoned");
        mean(&state.memory_samples)
    }

    /// Mean SoC temperature in degrees C, 0 when unavailable.
    pub fn temperature_c(&self) -> f64 {
        let state = self.state.lock().expect("perf lock poisoned");
        mean(&state.temperature_samples)
    }

    /// Clear all windows and timer state. Used between warm-up and
    /// measurement phases.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("perf lock poisoned");
        state.fps_samples.clear();
        state.process_times.clear();
        state.memory_samples.clear();
        state.temperature_samples.clear();
        state.last_frame_time = Instant::now();
        state.process_start = None;
    }

    /// Human-readable metrics block for shutdown/benchmark logs.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Performance Summary:".to_string(),
            format!("FPS: {:.2}", self.fps()),
            format!("Process Time: {:.2} ms", self.process_time_ms()),
        ];
        let memory = self.memory_mb();
        if memory > 0.0 {
            lines.push(format!("Memory Usage: {:.2} MB", memory));
        }
        let temperature = self.temperature_c();
        if temperature > 0.0 {
            lines.push(format!("Temperature: {:.2} C", temperature));
        }
        lines.join("\n")
    }
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Resident set size from procfs VmRSS, in MB.
fn read_memory_mb() -> Option<f64> {
    let status = std::fs::read_to_string(MEMINFO_PATH).ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: f64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb / 1024.0);
        }
    }
    None
}

/// SoC temperature from the first thermal zone, in degrees C.
fn read_temperature_c() -> Option<f64> {
    let raw = std::fs::read_to_string(THERMAL_PATH).ok()?;
    let millis: f64 = raw.trim().parse().ok()?;
    Some(millis / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_windows_report_zero() {
        let perf = PerfMonitor::new();
        assert_eq!(perf.fps(), 0.0);
        assert_eq!(perf.process_time_ms(), 0.0);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let perf = PerfMonitor::new();
        perf.stop_timer();
        assert_eq!(perf.process_time_ms(), 0.0);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let perf = PerfMonitor::with_max_samples(3);
        for duration in [0.1, 0.2, 0.3, 0.4] {
            perf.record_process_time(duration);
        }
        // Window holds [0.2, 0.3, 0.4]; mean 0.3 s = 300 ms.
        assert!((perf.process_time_ms() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn timer_records_duration_and_fps_tick() {
        let perf = PerfMonitor::new();
        perf.start_timer();
        std::thread::sleep(std::time::Duration::from_millis(5));
        perf.stop_timer();
        assert!(perf.process_time_ms() > 0.0);
        assert!(perf.fps() > 0.0);
    }

    #[test]
    fn reset_clears_everything() {
        let perf = PerfMonitor::new();
        perf.record_process_time(0.5);
        perf.reset();
        assert_eq!(perf.process_time_ms(), 0.0);
    }
}
