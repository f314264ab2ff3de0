//! hyprkan - app-aware kanata layer switcher
//!
//! Watches the focused window under Hyprland, Sway, or X11 and switches the
//! active [kanata](https://github.com/jtroo/kanata) layer over kanata's TCP
//! JSON protocol, following an ordered rule list. Matching rules can also run
//! a shell command, trigger a fake key, or move the mouse pointer.
//!
//! # Features
//! - First-match-wins rules on window class and title (literal substrings)
//! - Idempotent layer switching (no request when the layer is already active)
//! - One-shot CLI commands for scripting (layer queries, fake keys, mouse)
//! - Backend auto-detection from the session environment

pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod kanata;
pub mod wm;

// Re-export commonly used types for convenience
pub use cli::Args;
pub use config::Config;
pub use dispatch::Dispatcher;
pub use kanata::KanataClient;
