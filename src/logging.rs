//! Tracing subscriber setup

use std::env;
use std::io;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str) -> Result<()> {
    let filter = env::var("RUST_LOG").map_or_else(
        |_| EnvFilter::try_new(format!("menu_cost_calculator={level}")),
        EnvFilter::try_new,
    )?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
