//! Command-line interface definitions
//!
//! Uses clap for argument parsing with derive macros. One-shot actions are
//! flat flags in a mutually exclusive group; without one, hyprkan runs as a
//! daemon.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::kanata::parse_address;

/// hyprkan - app-aware kanata layer switcher
#[derive(Parser, Debug)]
#[command(name = "hyprkan")]
#[command(version)]
#[command(about = "App-aware kanata layer switcher for Hyprland, Sway, and X11")]
#[command(after_help = "\
BEHAVIOR:
  - Without a one-shot flag, hyprkan runs as a daemon: it watches the focused
    window and switches kanata layers according to the rule file
  - Rules are matched top to bottom; the first match wins
  - Rule patterns are case-sensitive substrings; \"*\" or omission matches anything

RULE FILE:
  $XDG_CONFIG_HOME/kanata/apps.json (override with -c), a JSON array:
    [
      {\"class\": \"chrome\", \"title\": \"YouTube\", \"layer\": \"media\"},
      {\"class\": \"kitty\", \"layer\": \"terminal\", \"cmd\": \"notify-send terminal\"},
      {\"layer\": \"base\"}
    ]

KANATA:
  kanata must be started with its TCP server enabled, e.g. `kanata -p 10000`.")]
pub struct Args {
    /// Print available layer names as JSON and exit
    #[arg(short = 'l', long, group = "command")]
    pub layers: bool,

    /// Switch to LAYER and exit
    #[arg(long, value_name = "LAYER", group = "command")]
    pub change_layer: Option<String>,

    /// Move the mouse pointer to X Y and exit
    #[arg(long, num_args = 2, value_names = ["X", "Y"], group = "command",
          allow_negative_numbers = true)]
    pub set_mouse: Option<Vec<i32>>,

    /// Trigger a fake key and exit (ACTION: press, release, tap, toggle)
    #[arg(long, num_args = 2, value_names = ["NAME", "ACTION"], group = "command")]
    pub fake_key: Option<Vec<String>>,

    /// Print the active layer name and exit
    #[arg(long, group = "command")]
    pub current_layer_name: bool,

    /// Print the active layer info as JSON and exit
    #[arg(long, group = "command")]
    pub current_layer_info: bool,

    /// Print the focused window as JSON and exit, after an optional delay
    #[arg(short = 'w', long, value_name = "SECONDS", num_args = 0..=1,
          default_missing_value = "0", group = "command")]
    pub win: Option<u64>,

    /// kanata TCP server, as PORT or IP:PORT
    #[arg(short = 'p', long = "port", value_name = "ADDR",
          default_value = "127.0.0.1:10000", value_parser = parse_address)]
    pub port: SocketAddr,

    /// Path to the rule file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (overridden by -q and -d)
    #[arg(long, value_name = "LEVEL", default_value = "warn",
          value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub debug: bool,
}

impl Args {
    /// Log level after applying the -q/-d shortcuts.
    #[must_use]
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "error"
        } else if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}
