//! Window source abstraction layer
//!
//! Provides focused-window information and focus-change event streams from:
//! - Hyprland (instance IPC sockets)
//! - Sway (i3-ipc protocol)
//! - X11 (EWMH root window properties)
//!
//! The backend is picked from the session environment, never from config.

mod hyprland;
mod sway;
mod x11;

use anyhow::{Result, bail};
use serde::Serialize;
use std::env;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// The focused window, reduced to what rules match on.
///
/// Fields that the window system cannot report are `"*"` so that wildcard
/// rules still apply to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowDescription {
    pub class: String,
    pub title: String,
}

impl Default for WindowDescription {
    fn default() -> Self {
        Self {
            class: "*".to_string(),
            title: "*".to_string(),
        }
    }
}

impl WindowDescription {
    /// Build a description from possibly-empty strings, mapping empty fields
    /// to the wildcard placeholder.
    pub fn from_parts(class: &str, title: &str) -> Self {
        Self {
            class: if class.is_empty() { "*".to_string() } else { class.to_string() },
            title: if title.is_empty() { "*".to_string() } else { title.to_string() },
        }
    }
}

/// A source of focused-window information.
///
/// Implementations do blocking I/O; the daemon runs them on a dedicated
/// thread via [`spawn_event_thread`].
pub trait WindowSource: Send {
    /// Query the currently focused window.
    fn current_window(&mut self) -> Result<WindowDescription>;

    /// Block forever, invoking `notify` once per focus change.
    ///
    /// Only returns on error; a closed connection to the window system is an
    /// error.
    fn watch(&mut self, notify: &mut dyn FnMut(WindowDescription)) -> Result<()>;
}

/// Pick a window source from the session environment.
pub fn detect() -> Result<Box<dyn WindowSource>> {
    if env::var_os("WAYLAND_DISPLAY").is_some()
        && env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some()
    {
        info!("Detected Hyprland session");
        return Ok(Box::new(hyprland::Hyprland::connect()?));
    }
    if env::var_os("SWAYSOCK").is_some() {
        info!("Detected Sway session");
        return Ok(Box::new(sway::Sway::connect()?));
    }
    if env::var_os("DISPLAY").is_some() {
        info!("Detected X11 session");
        return Ok(Box::new(x11::X11::connect()?));
    }
    bail!(
        "Unsupported environment: no Hyprland, Sway, or X11 session detected.\n\
         \n\
         Checked, in order:\n\
         - WAYLAND_DISPLAY + HYPRLAND_INSTANCE_SIGNATURE (Hyprland)\n\
         - SWAYSOCK (Sway)\n\
         - DISPLAY (X11)"
    )
}

/// Spawn a dedicated thread running the source's event loop.
///
/// The current window is emitted first so rules apply immediately on startup,
/// then one event per focus change. The channel closes when the window system
/// connection is lost.
pub fn spawn_event_thread(
    mut source: Box<dyn WindowSource>,
) -> mpsc::UnboundedReceiver<WindowDescription> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        match source.current_window() {
            Ok(win) => {
                let _ = tx.send(win);
            }
            Err(e) => warn!("Could not query the focused window at startup: {e:#}"),
        }
        if let Err(e) = source.watch(&mut |win| {
            let _ = tx.send(win);
        }) {
            error!("Window event loop error: {e:#}");
        }
    });
    rx
}
