//! sentineld - zone intrusion detection daemon
//!
//! This daemon:
//! 1. Captures frames from the configured source into a bounded queue
//! 2. Runs detection, attributes hits to zones by their feet anchor
//! 3. Dispatches cooldown-gated alerts and persists detection frames
//! 4. Tracks rolling FPS/latency/host metrics
//!
//! `--benchmark` runs the offline benchmark instead of the live pipeline.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use zone_sentinel::bench::BenchmarkRunner;
use zone_sentinel::pipeline::PipelineSettings;
use zone_sentinel::source::FileSource;
use zone_sentinel::{
    AlertDispatcher, Detector, FrameSource, PerfMonitor, Pipeline, SentineldConfig, StubDetector,
    SyntheticSource, ZoneIndex,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Run the offline benchmark instead of the live pipeline.
    #[arg(long)]
    benchmark: bool,

    /// Where the benchmark report is written.
    #[arg(long, default_value = "benchmark_report.json")]
    report: PathBuf,

    /// Path to the zone file maintained by zonectl. Falls back to the zones
    /// embedded in the configuration when the file does not exist.
    #[arg(long, env = "SENTINEL_ZONES", default_value = "config/zones.json")]
    zones: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => SentineldConfig::load_from(path)?,
        None => SentineldConfig::load()?,
    };

    let mut source = build_source(&cfg)?;
    let mut detector: Box<dyn Detector> = Box::new(StubDetector::new());
    let zones = if args.zones.exists() {
        Arc::new(ZoneIndex::load(&args.zones)?)
    } else {
        Arc::new(ZoneIndex::from_records(&cfg.zones))
    };
    let perf = Arc::new(PerfMonitor::new());
    log::info!(
        "sentineld starting: source={} detector={} zones={}",
        cfg.camera.source,
        detector.name(),
        zones.len()
    );

    if args.benchmark {
        let runner = BenchmarkRunner::new(
            cfg.model.confidence_threshold,
            cfg.model.target_classes.clone(),
        );
        let report = runner.run(
            source.as_mut(),
            detector.as_mut(),
            &zones,
            &perf,
            serde_json::to_value(&cfg)?,
        )?;
        report.save(&args.report)?;
        log::info!("benchmark report written to {}", args.report.display());
        println!("{}", perf.summary());
        return Ok(());
    }

    let dispatcher = Arc::new(AlertDispatcher::from_settings(&cfg.alerts)?);
    log::info!("alert channels configured: {}", dispatcher.channel_count());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            log::info!("shutdown signal received");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let pipeline = Pipeline::new(
        PipelineSettings::from_config(&cfg),
        source,
        detector,
        Arc::clone(&zones),
        dispatcher,
        Arc::clone(&perf),
    );
    let handle = pipeline.spawn(Arc::clone(&running))?;

    let mut ticks = 0u64;
    while handle.is_running() {
        std::thread::sleep(Duration::from_millis(500));
        ticks += 1;
        if ticks % 10 == 0 {
            let (captured, dropped, _, alerts) = handle.counters().snapshot();
            log::info!(
                "health: frames={} dropped={} alerts={} fps={:.1}",
                captured,
                dropped,
                alerts,
                perf.fps()
            );
        }
    }
    handle.join()?;

    println!("{}", perf.summary());
    Ok(())
}

fn build_source(cfg: &SentineldConfig) -> Result<Box<dyn FrameSource>> {
    let source = cfg.camera.source.as_str();
    if source.starts_with("synthetic://") || source == "synthetic" {
        return Ok(Box::new(SyntheticSource::new(
            cfg.camera.width,
            cfg.camera.height,
        )));
    }
    if let Some(dir) = source.strip_prefix("file://") {
        return Ok(Box::new(FileSource::open(dir.as_ref(), true)?));
    }
    Err(anyhow!(
        "unsupported camera source {} (expected synthetic:// or file://<dir>)",
        source
    ))
}
