//! channel_test - alert channel verification tool
//!
//! Builds the alert dispatcher exactly as the daemon would and pushes a
//! synthetic test alert through every configured channel, reporting each
//! outcome. The cooldown gate is bypassed; nothing is persisted.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use zone_sentinel::{AlertDispatcher, SentineldConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => SentineldConfig::load_from(path)?,
        None => SentineldConfig::load()?,
    };

    let dispatcher = AlertDispatcher::from_settings(&cfg.alerts)?;
    if dispatcher.channel_count() == 0 {
        println!("no alert channels configured");
        return Ok(());
    }

    let results = dispatcher.test_channels();
    let mut failures = 0;
    for (channel, ok) in &results {
        println!("{}: {}", channel, if *ok { "ok" } else { "FAILED" });
        if !ok {
            failures += 1;
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} channels failed", failures, results.len());
    }
    Ok(())
}
