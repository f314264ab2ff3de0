//! Daemon mode
//!
//! Runs the main event loop: window focus events from the source thread,
//! dispatched one at a time, until a shutdown signal arrives or the window
//! system goes away.

use anyhow::{Context, Result};
use tokio::signal;
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tracing::{error, info};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::kanata::KanataClient;
use crate::wm::{self, WindowSource};

/// Run the daemon until shutdown.
///
/// Dispatch errors are fatal: once the kanata connection is gone there is
/// nothing useful left to do, and the supervisor restarts the process.
pub async fn run(config: Config, kanata: KanataClient, source: Box<dyn WindowSource>) -> Result<()> {
    info!("Starting hyprkan daemon ({} rules)", config.rules.len());

    let mut window_events = wm::spawn_event_thread(source);
    info!("Window event thread started");

    let mut dispatcher = Dispatcher::new(config, kanata);
    let mut sigterm =
        unix_signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            event = window_events.recv() => {
                match event {
                    Some(win) => dispatcher.handle_focus(win).await?,
                    None => {
                        error!("Window system connection lost (event channel closed)");
                        break;
                    }
                }
            }

            _ = signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    dispatcher.kanata_mut().close().await;
    Ok(())
}
