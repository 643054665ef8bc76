use crate::config::{Config, EnforcementConfig, FALLBACK_CHECK_FREQUENCY};
use crate::error::CycleError;
use crate::poll::{self, PassReport};
use crate::server::MySqlServer;
use anyhow::Result;
use shared::log_error_chain;
use shared::shutdown::Shutdown;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// Runs check cycles until shutdown is requested, or a single one with `--once`.
///
/// Failing cycles are logged and the loop goes on. A cycle that already started is always
/// completed before the loop ends.
pub(crate) async fn run(config: &Config, mut shutdown: Shutdown) -> Result<()> {
    // Kept from the last successfully loaded config
    let mut check_frequency = FALLBACK_CHECK_FREQUENCY;

    loop {
        let res = run_cycle(&config.config_file, &mut check_frequency).await;

        if config.once {
            res?;
            return Ok(());
        }

        if let Err(err) = res {
            log_error_chain!(err, "Check cycle aborted");
        }

        log::debug!("Next check cycle in {check_frequency:?}");

        tokio::select! {
            _ = sleep(check_frequency) => {}
            _ = shutdown.wait() => { break; }
        }
    }

    log::debug!("Polling loop has been shut down");

    Ok(())
}

/// Loads the config, then runs one pass over a fresh connection.
async fn run_cycle(
    config_file: &Path,
    check_frequency: &mut Duration,
) -> Result<PassReport, CycleError> {
    let cfg = EnforcementConfig::load(config_file).map_err(CycleError::Config)?;
    *check_frequency = cfg.check_frequency;

    let mut server = MySqlServer::connect(&cfg.mysql).await?;

    // On error, the connection is just dropped. The next cycle reconnects.
    let report = poll::run_pass(&mut server, &cfg).await?;

    if let Err(err) = server.close().await {
        log_error_chain!(err, "Closing the server connection failed");
    }

    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(once: bool) -> Config {
        Config {
            config_file: "/nonexistent/mysql-quotad/quotad.toml".into(),
            once,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_config_aborts_cycle() {
        let mut check_frequency = FALLBACK_CHECK_FREQUENCY;

        let res = run_cycle(&config(false).config_file, &mut check_frequency).await;

        assert!(matches!(res, Err(CycleError::Config(_))));
        assert_eq!(check_frequency, FALLBACK_CHECK_FREQUENCY);
    }

    #[tokio::test]
    async fn once_reports_failure() {
        let (shutdown, _control) = shared::shutdown::new();

        let err = run(&config(true), shutdown).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CycleError>(),
            Some(CycleError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_loop() {
        let (shutdown, control) = shared::shutdown::new();
        control.shutdown();

        // Returns after the first cycle instead of sleeping
        run(&config(false), shutdown).await.unwrap();
    }
}
