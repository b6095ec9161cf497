use color_eyre::{eyre::eyre, Result};
use joystick_session::{
    Config, EventKind, JoystickError, Notification, Registry, ResourceHandle, TokioMultiplexer,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = setup()?;

    let index = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u32>()
            .map_err(|e| eyre!("Invalid device index {:?}: {}", arg, e))?,
        None => 0,
    };

    info!("Using device directory {}", config.device_dir.display());
    let multiplexer = Arc::new(TokioMultiplexer::current());
    let registry = Registry::linux(&config, multiplexer);

    let session = registry.clone();
    let monitor = registry.spawn_owned(move |owner, mut inbox| async move {
        let js = session.open(index, &owner)?;
        let info = session.info(js)?;
        println!(
            "{} (version 0x{:04X}, {} axes, {} buttons)",
            info.name, info.version, info.axes, info.buttons
        );

        session.arm(js)?;
        loop {
            tokio::select! {
                notification = inbox.recv() => {
                    let Some(Notification::Readable(handle)) = notification else {
                        warn!("Inbox closed");
                        break;
                    };
                    debug!("{} readable", handle);
                    drain_all(&session, handle)?;
                    session.arm(handle)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping {}", js);
                    session.stop(js)?;
                    break;
                }
            }
        }

        session.release(js)?;
        Ok::<(), JoystickError>(())
    });

    match monitor.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("Joystick session failed: {}", e);
            Err(e.into())
        }
        Err(e) => Err(eyre!("Joystick task aborted: {}", e)),
    }
}

fn drain_all(registry: &Registry, handle: ResourceHandle) -> Result<(), JoystickError> {
    loop {
        match registry.drain(handle) {
            Ok(event) => {
                let label = match event.kind {
                    EventKind::Axis => "axis",
                    EventKind::Button => "button",
                    EventKind::InitAxis => "axis (init)",
                    EventKind::InitButton => "button (init)",
                };
                println!(
                    "{:>10} ms  {:<13} #{:<3} {:>6}  (raw {})",
                    event.timestamp, label, event.number, event.value, event.raw_value
                );
            }
            Err(JoystickError::WouldBlock) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn setup() -> Result<Config> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    // The log level lives in the config, so loading it logs at the default level.
    let config = tracing::subscriber::with_default(subscriber(Level::INFO), Config::load)?;

    let level = Level::from_str(&config.log_level).unwrap_or(Level::INFO);
    tracing::subscriber::set_global_default(subscriber(level))?;
    debug!("Log level {}", level);
    Ok(config)
}

fn subscriber(level: Level) -> FmtSubscriber {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish()
}
