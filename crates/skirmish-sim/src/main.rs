//! # Skirmish Sim
//!
//! Headless driver for Project Skirmish.
//!
//! Runs a scripted encounter for a fixed number of simulated seconds:
//! - Hordes spawned from pools while the phase flag says play
//! - A boss whose summons are placed into a minion horde
//! - A turret shooting the nearest enemy
//!
//! Usage: `skirmish [CONFIG]` or `skirmish --init [CONFIG]` to write the
//! default configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod encounter;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{SimConfig, CONFIG_FILE};
use crate::encounter::Encounter;

/// Set to `json` for machine-readable logs.
const LOG_FORMAT_VAR: &str = "SKIRMISH_LOG_FORMAT";

/// Main entry point.
fn main() -> Result<()> {
    init_tracing()?;

    info!("Project Skirmish starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1).peekable();
    let init = args.next_if(|a| a == "--init").is_some();
    let path = args.next().map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);

    if init {
        SimConfig::default()
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        return Ok(());
    }

    let config = SimConfig::load_from(&path).with_context(|| format!("loading {}", path.display()))?;
    let mut encounter = Encounter::new(config).context("building encounter")?;
    let summary = encounter.run();

    info!("{} enemies still in the world", encounter.live_count());
    info!("Summary: {}", serde_json::to_string(&summary)?);
    info!("Project Skirmish shutdown complete");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let json = std::env::var(LOG_FORMAT_VAR).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (plain, structured) = if json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(plain)
        .with(structured)
        .with(EnvFilter::from_default_env().add_directive("skirmish=info".parse()?))
        .init();
    Ok(())
}
