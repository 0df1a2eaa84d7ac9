//! zonectl - zone table editing tool
//!
//! Operates on a zone file (`zone_id -> {name, points, color, alert_enabled}`
//! JSON) shared with the daemon. Every mutation validates before it writes;
//! a polygon with fewer than 3 vertices never reaches the file.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zone_sentinel::ZoneIndex;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the zone file.
    #[arg(long, env = "SENTINEL_ZONES", default_value = "config/zones.json")]
    zones: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all zones.
    List,
    /// Add a zone.
    Add {
        id: String,
        /// Display name.
        #[arg(long)]
        name: String,
        /// Polygon vertices as "x,y" pairs, at least 3.
        #[arg(long, num_args = 3.., value_parser = parse_point)]
        point: Vec<(f64, f64)>,
        /// RGB display color as "r,g,b".
        #[arg(long, default_value = "255,0,0", value_parser = parse_color)]
        color: (u8, u8, u8),
        /// Create the zone with alerts disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// Update fields of an existing zone.
    Update {
        id: String,
        /// Replacement polygon vertices as "x,y" pairs.
        #[arg(long, num_args = 3.., value_parser = parse_point)]
        point: Option<Vec<(f64, f64)>>,
        /// RGB display color as "r,g,b".
        #[arg(long, value_parser = parse_color)]
        color: Option<(u8, u8, u8)>,
        /// Enable or disable alerts for this zone.
        #[arg(long)]
        alerts: Option<bool>,
    },
    /// Remove a zone.
    Remove { id: String },
}

fn parse_point(raw: &str) -> Result<(f64, f64)> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected x,y"))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

fn parse_color(raw: &str) -> Result<(u8, u8, u8)> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return Err(anyhow!("expected r,g,b"));
    }
    Ok((
        parts[0].trim().parse()?,
        parts[1].trim().parse()?,
        parts[2].trim().parse()?,
    ))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let index = ZoneIndex::load(&args.zones)?;

    match args.command {
        Command::List => {
            if index.is_empty() {
                println!("no zones defined in {}", args.zones.display());
                return Ok(());
            }
            for zone in index.snapshot().iter() {
                println!(
                    "{}: \"{}\" {} vertices, color {:?}, alerts {}",
                    zone.id,
                    zone.name,
                    zone.polygon.vertices().len(),
                    zone.color,
                    if zone.alert_enabled { "on" } else { "off" }
                );
            }
            return Ok(());
        }
        Command::Add {
            id,
            name,
            point,
            color,
            disabled,
        } => {
            index.add(&id, &name, point, [color.0, color.1, color.2], !disabled)?;
            println!("added zone {}", id);
        }
        Command::Update {
            id,
            point,
            color,
            alerts,
        } => {
            index.update(
                &id,
                point,
                alerts,
                color.map(|c| [c.0, c.1, c.2]),
            )?;
            println!("updated zone {}", id);
        }
        Command::Remove { id } => {
            index.remove(&id)?;
            println!("removed zone {}", id);
        }
    }

    index.save(&args.zones)?;
    Ok(())
}
