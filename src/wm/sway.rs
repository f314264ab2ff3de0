//! Sway backend
//!
//! Speaks the i3-ipc protocol over `$SWAYSOCK`: GET_TREE for one-shot
//! queries, SUBSCRIBE to window events for the focus stream. Native windows
//! report `app_id`; XWayland windows report `window_properties.class`.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use tracing::warn;

use super::{WindowDescription, WindowSource};

const IPC_MAGIC: &[u8; 6] = b"i3-ipc";
const IPC_SUBSCRIBE: u32 = 2;
const IPC_GET_TREE: u32 = 4;
const IPC_EVENT_WINDOW: u32 = 0x8000_0003;

pub struct Sway {
    socket_path: PathBuf,
}

impl Sway {
    pub fn connect() -> Result<Self> {
        let socket_path = PathBuf::from(env::var("SWAYSOCK").context("SWAYSOCK is not set")?);
        if !socket_path.exists() {
            bail!("Sway IPC socket not found at {socket_path:?}. Is sway running?");
        }
        Ok(Self { socket_path })
    }

    fn open(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path)
            .with_context(|| format!("Failed to connect to sway at {:?}", self.socket_path))
    }
}

/// Write one i3-ipc frame: magic, payload length, message type, payload.
/// Length and type are native-endian per the protocol.
fn send_message(stream: &mut UnixStream, msg_type: u32, payload: &[u8]) -> Result<()> {
    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(IPC_MAGIC);
    frame.extend_from_slice(&u32::try_from(payload.len())?.to_ne_bytes());
    frame.extend_from_slice(&msg_type.to_ne_bytes());
    frame.extend_from_slice(payload);
    stream
        .write_all(&frame)
        .context("Failed to write to sway IPC socket")?;
    Ok(())
}

/// Read one i3-ipc frame, returning the message type and payload.
fn read_message(stream: &mut UnixStream) -> Result<(u32, Vec<u8>)> {
    let mut header = [0u8; 14];
    stream
        .read_exact(&mut header)
        .context("Failed to read from sway IPC socket")?;
    if &header[..6] != IPC_MAGIC {
        bail!("Invalid i3-ipc magic from sway socket");
    }
    let len = u32::from_ne_bytes([header[6], header[7], header[8], header[9]]) as usize;
    let msg_type = u32::from_ne_bytes([header[10], header[11], header[12], header[13]]);
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .context("Failed to read sway IPC payload")?;
    Ok((msg_type, payload))
}

/// Depth-first search for the focused container in a GET_TREE reply.
fn find_focused(node: &Value) -> Option<&Value> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        return Some(node);
    }
    for key in ["nodes", "floating_nodes"] {
        if let Some(children) = node.get(key).and_then(Value::as_array) {
            for child in children {
                if let Some(found) = find_focused(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn describe(container: &Value) -> WindowDescription {
    let class = container
        .get("app_id")
        .and_then(Value::as_str)
        .or_else(|| {
            container
                .pointer("/window_properties/class")
                .and_then(Value::as_str)
        })
        .unwrap_or("");
    let title = container.get("name").and_then(Value::as_str).unwrap_or("");
    WindowDescription::from_parts(class, title)
}

impl WindowSource for Sway {
    fn current_window(&mut self) -> Result<WindowDescription> {
        let mut stream = self.open()?;
        send_message(&mut stream, IPC_GET_TREE, b"")?;
        let (_, payload) = read_message(&mut stream)?;
        let tree: Value =
            serde_json::from_slice(&payload).context("Malformed GET_TREE reply from sway")?;
        Ok(find_focused(&tree).map(describe).unwrap_or_default())
    }

    fn watch(&mut self, notify: &mut dyn FnMut(WindowDescription)) -> Result<()> {
        let mut stream = self.open()?;
        send_message(&mut stream, IPC_SUBSCRIBE, br#"["window"]"#)?;
        let (_, payload) = read_message(&mut stream)?;
        let reply: Value =
            serde_json::from_slice(&payload).context("Malformed SUBSCRIBE reply from sway")?;
        if reply.get("success").and_then(Value::as_bool) != Some(true) {
            bail!("sway rejected the window event subscription: {reply}");
        }

        loop {
            let (msg_type, payload) = read_message(&mut stream)?;
            if msg_type != IPC_EVENT_WINDOW {
                continue;
            }
            let event: Value = match serde_json::from_slice(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Malformed window event from sway: {e}");
                    continue;
                }
            };
            if event.get("change").and_then(Value::as_str) != Some("focus") {
                continue;
            }
            if let Some(container) = event.get("container") {
                notify(describe(container));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn focused_container_is_found_in_nested_tree() {
        let tree = json!({
            "focused": false,
            "nodes": [
                { "focused": false, "nodes": [], "floating_nodes": [] },
                {
                    "focused": false,
                    "nodes": [
                        { "focused": true, "app_id": "foot", "name": "~", "nodes": [] }
                    ]
                }
            ]
        });
        let win = find_focused(&tree).map(describe).unwrap();
        assert_eq!(win.class, "foot");
        assert_eq!(win.title, "~");
    }

    #[test]
    fn xwayland_windows_use_window_properties_class() {
        let container = json!({
            "app_id": null,
            "name": "Steam",
            "window_properties": { "class": "steam" }
        });
        let win = describe(&container);
        assert_eq!(win.class, "steam");
        assert_eq!(win.title, "Steam");
    }

    #[test]
    fn missing_fields_become_wildcards() {
        let win = describe(&json!({}));
        assert_eq!(win, WindowDescription::default());
    }
}
