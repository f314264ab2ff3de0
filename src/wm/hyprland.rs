//! Hyprland backend
//!
//! Uses Hyprland's per-instance UNIX sockets: `.socket.sock` for one-shot
//! queries and `.socket2.sock` for the event stream. Both live under
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/`.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::env;
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use tracing::warn;

use super::{WindowDescription, WindowSource};

pub struct Hyprland {
    query_path: PathBuf,
    event_path: PathBuf,
}

impl Hyprland {
    pub fn connect() -> Result<Self> {
        let runtime_dir = env::var("XDG_RUNTIME_DIR").context("XDG_RUNTIME_DIR is not set")?;
        let signature = env::var("HYPRLAND_INSTANCE_SIGNATURE")
            .context("HYPRLAND_INSTANCE_SIGNATURE is not set")?;
        let dir = PathBuf::from(runtime_dir).join("hypr").join(signature);
        let query_path = dir.join(".socket.sock");
        let event_path = dir.join(".socket2.sock");
        if !query_path.exists() || !event_path.exists() {
            bail!("Hyprland IPC sockets not found in {dir:?}. Is Hyprland running?");
        }
        Ok(Self {
            query_path,
            event_path,
        })
    }
}

/// Parse the JSON reply to `j/activewindow`. Anything unexpected degrades to
/// the wildcard window.
fn parse_active_window(response: &str) -> WindowDescription {
    let value: Value = match serde_json::from_str(response) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed activewindow reply from Hyprland ({e}): {response}");
            return WindowDescription::default();
        }
    };
    let class = value.get("class").and_then(Value::as_str).unwrap_or("");
    let title = value.get("title").and_then(Value::as_str).unwrap_or("");
    WindowDescription::from_parts(class, title)
}

impl WindowSource for Hyprland {
    fn current_window(&mut self) -> Result<WindowDescription> {
        let mut stream = UnixStream::connect(&self.query_path)
            .with_context(|| format!("Failed to connect to Hyprland at {:?}", self.query_path))?;
        stream
            .write_all(b"j/activewindow")
            .context("Failed to query Hyprland for the active window")?;
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .context("Failed to read Hyprland reply")?;
        Ok(parse_active_window(&response))
    }

    fn watch(&mut self, notify: &mut dyn FnMut(WindowDescription)) -> Result<()> {
        let stream = UnixStream::connect(&self.event_path)
            .with_context(|| format!("Failed to connect to Hyprland at {:?}", self.event_path))?;
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let line = line.context("Hyprland event socket read failed")?;
            // Events look like "activewindow>>class,title"; the title may
            // itself contain commas, the class may not.
            if let Some(data) = line.strip_prefix("activewindow>>") {
                let (class, title) = data.split_once(',').unwrap_or((data, ""));
                notify(WindowDescription::from_parts(class, title));
            }
        }
        bail!("Hyprland event socket closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn active_window_reply_is_parsed() {
        let win = parse_active_window(r#"{"class":"firefox","title":"Rust - Mozilla Firefox"}"#);
        assert_eq!(win.class, "firefox");
        assert_eq!(win.title, "Rust - Mozilla Firefox");
    }

    #[test]
    fn empty_reply_degrades_to_wildcards() {
        assert_eq!(parse_active_window("{}"), WindowDescription::default());
        assert_eq!(parse_active_window("Invalid"), WindowDescription::default());
    }
}
