use anyhow::Context;
use quotad::config::LogTarget;
use shared::{journald_logger, shutdown};
use tokio::signal::ctrl_c;
use tokio::signal::unix::{SignalKind, signal};

fn main() -> Result<(), i32> {
    inner_main().map_err(|err| {
        eprintln!("{err:#}");
        1
    })?;

    Ok(())
}

fn inner_main() -> anyhow::Result<()> {
    let (config, info_log) = quotad::config::load_and_parse()?;

    match config.log_target {
        LogTarget::Std => Ok(env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(config.log_level.as_str()),
        )
        .try_init()?),
        LogTarget::Journald => journald_logger::init("mysql-quotad", config.log_level),
    }
    .context("Logger initialization failed")?;

    // log info from load_and_parse
    for l in info_log {
        log::info!(target: "quotad::config", "{l}");
    }

    let (shutdown, shutdown_control) = shutdown::new();

    // Polling is sequential, one thread is enough
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).context("Registering SIGTERM handler failed")?;

        tokio::spawn(async move {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = sigterm.recv() => {}
            }

            log::warn!(
                "Received termination signal. Waiting for the running cycle to complete ..."
            );

            shutdown_control.shutdown();
        });

        // notify systemd manager that the process is ready
        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

        quotad::run(config, shutdown).await?;

        log::warn!("Shutdown completed");

        Ok::<(), anyhow::Error>(())
    })
}
