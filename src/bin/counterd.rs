//! counterd - livestock counting stream daemon
//!
//! This daemon:
//! 1. Loads configuration (FLOCK_CONFIG file + FLOCK_* environment overrides)
//! 2. Builds the detector registry and checks the configured detector exists
//! 3. Serves the WebSocket control/stream endpoint until Ctrl-C
//!
//! Every connection owns its own session; stopping the daemon stops them all.

use anyhow::{anyhow, Result};
use std::sync::{mpsc, Arc};

use flock_counter::{config::CounterdConfig, BackendRegistry, StreamServer};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = CounterdConfig::load()?;
    let registry = BackendRegistry::with_builtin();
    if !registry.contains(&config.detector) {
        return Err(anyhow!(
            "detector '{}' is not available (known: {})",
            config.detector,
            registry.list().join(", ")
        ));
    }

    log::info!(
        "counterd {}: detector={} class={} min_confidence={:.2} cameras={}",
        env!("CARGO_PKG_VERSION"),
        config.detector,
        config.policy.target_class,
        config.policy.min_confidence,
        config.video.cameras.join(",")
    );

    let server = StreamServer::new(
        config.listen_addr.clone(),
        Arc::new(registry),
        config.controller_settings(),
    );
    let handle = server.spawn()?;
    log::info!("counterd running on ws://{}", handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("counterd waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping sessions...");
    handle.stop()?;

    Ok(())
}
