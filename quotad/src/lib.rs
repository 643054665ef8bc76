//! The MySQL quota enforcement daemon

pub mod config;
mod enforce;
pub mod error;
mod poll;
mod quota;
mod server;
mod timer;
mod usage;

use crate::config::Config;
use anyhow::Result;
use shared::shutdown::Shutdown;

/// Runs the quota enforcement.
///
/// Supposed to be called by the binary in main.rs after logging has been set up. Checks all
/// databases once per configured interval.
///
/// # Return behavior
/// Returns after `shutdown` has been requested and the running cycle has completed. With
/// `config.once` set, returns after the first cycle, with an error if that cycle was aborted.
pub async fn run(config: Config, shutdown: Shutdown) -> Result<()> {
    log::info!("Enforcing quotas configured in {:?}", config.config_file);

    timer::run(&config, shutdown).await
}
