//! kanata TCP protocol client
//!
//! Speaks kanata's newline-delimited JSON protocol over a single TCP
//! connection. The connection is opened lazily on the first request and never
//! re-established: once the daemon goes away, the next request fails and the
//! process supervisor is expected to restart us.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Wait for the first reply after connecting. Some kanata builds answer the
/// probe immediately, others only start talking on layer changes.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// Per-read timeout while draining stale input before a request.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(10);
/// Per-read timeout while waiting for a response line.
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(50);

// ============================================================================
// Wire Types
// ============================================================================

/// Requests understood by the kanata TCP server.
///
/// Serializes to the externally tagged form kanata expects, e.g.
/// `{"ChangeLayer":{"new":"media"}}`.
#[derive(Debug, Clone, Serialize)]
pub enum ClientRequest {
    RequestCurrentLayerName {},
    RequestCurrentLayerInfo {},
    RequestLayerNames {},
    ChangeLayer { new: String },
    ActOnFakeKey { name: String, action: FakeKeyAction },
    SetMouse { x: i32, y: i32 },
}

/// Action applied to a kanata virtual (fake) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FakeKeyAction {
    Press,
    Release,
    Tap,
    Toggle,
}

impl FromStr for FakeKeyAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "press" => Ok(Self::Press),
            "release" => Ok(Self::Release),
            "tap" => Ok(Self::Tap),
            "toggle" => Ok(Self::Toggle),
            other => bail!(
                "Invalid fake key action '{other}'. Must be: press, release, tap, or toggle"
            ),
        }
    }
}

impl fmt::Display for FakeKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Press => "Press",
            Self::Release => "Release",
            Self::Tap => "Tap",
            Self::Toggle => "Toggle",
        };
        f.write_str(name)
    }
}

/// A virtual key plus the action to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeKey {
    pub name: String,
    pub action: FakeKeyAction,
}

// ============================================================================
// Address Parsing
// ============================================================================

/// Parse a kanata server address: a bare port (loopback assumed) or `IP:PORT`.
pub fn parse_address(s: &str) -> Result<SocketAddr> {
    let s = s.trim();
    if let Ok(port) = s.parse::<u16>() {
        if port == 0 {
            bail!("Port must be between 1 and 65535");
        }
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }
    let addr: SocketAddr = s.parse().map_err(|_| {
        anyhow::anyhow!("Invalid address '{s}'. Use PORT or IP:PORT, e.g. 10000 or 127.0.0.1:10000")
    })?;
    if addr.port() == 0 {
        bail!("Port must be between 1 and 65535");
    }
    Ok(addr)
}

// ============================================================================
// Client
// ============================================================================

/// Line-oriented JSON client for the kanata TCP server.
///
/// kanata broadcasts unsolicited `LayerChange` notifications on the same
/// socket, so before every request the input buffer is drained and complete
/// stale lines are discarded. Only a trailing incomplete fragment survives,
/// keeping the stream aligned on line boundaries.
pub struct KanataClient {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    buffer: String,
}

impl KanataClient {
    /// Create a client for the given address. No I/O happens until the first
    /// request.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stream: None,
            buffer: String::new(),
        }
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect(self.addr).await.with_context(|| {
            format!(
                "Cannot connect to kanata at {}. Is kanata running with the -p/--port option?",
                self.addr
            )
        })?;
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;
        self.stream = Some(stream);
        debug!("Connected to kanata at {}", self.addr);

        // Probe the fresh connection so a half-open server surfaces now
        // rather than on the first real request.
        self.request(&ClientRequest::RequestCurrentLayerName {}, PROBE_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Send a request and wait briefly for a response line.
    ///
    /// Returns `Ok(None)` when the server stays silent; fire-and-forget
    /// requests (`SetMouse`, `ActOnFakeKey`) routinely do.
    pub async fn send(&mut self, request: &ClientRequest) -> Result<Option<String>> {
        self.connect().await?;
        self.request(request, RESPONSE_TIMEOUT).await
    }

    async fn request(
        &mut self,
        request: &ClientRequest,
        read_timeout: Duration,
    ) -> Result<Option<String>> {
        self.flush_stale().await;

        let mut line =
            serde_json::to_string(request).context("Failed to serialize kanata request")?;
        line.push('\n');
        debug!("-> kanata: {}", line.trim_end());

        let stream = self
            .stream
            .as_mut()
            .context("kanata connection is closed")?;
        stream
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to send request to kanata at {}", self.addr))?;

        self.read_response(read_timeout).await
    }

    /// Drain whatever the server pushed since the last request and drop every
    /// complete line. A trailing fragment without a newline stays buffered.
    async fn flush_stale(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let mut pending = String::new();
        let mut buf = [0u8; 4096];
        loop {
            match timeout(FLUSH_TIMEOUT, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break, // peer closed; the next write reports it
                Ok(Ok(n)) => pending.push_str(&String::from_utf8_lossy(&buf[..n])),
                Ok(Err(_)) | Err(_) => break,
            }
        }
        self.buffer.push_str(&pending);

        if let Some(idx) = self.buffer.rfind('\n') {
            let stale = &self.buffer[..=idx];
            if !stale.trim().is_empty() {
                debug!("Discarding {} bytes of stale kanata output", stale.len());
            }
            self.buffer.drain(..=idx);
        }
    }

    /// Accumulate reads until a full line arrives, then return the first
    /// non-empty complete line. Extra complete lines are dropped; a trailing
    /// fragment stays buffered for the next flush.
    async fn read_response(&mut self, read_timeout: Duration) -> Result<Option<String>> {
        loop {
            if self.buffer.contains('\n') {
                break;
            }
            let stream = self
                .stream
                .as_mut()
                .context("kanata connection is closed")?;
            let mut buf = [0u8; 4096];
            match timeout(read_timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => bail!("kanata closed the connection"),
                Ok(Ok(n)) => self.buffer.push_str(&String::from_utf8_lossy(&buf[..n])),
                Ok(Err(e)) => return Err(e).context("Failed to read from kanata"),
                Err(_) => return Ok(None),
            }
        }

        let tail_start = self.buffer.rfind('\n').map_or(0, |i| i + 1);
        let complete = self.buffer[..tail_start].to_string();
        self.buffer.drain(..tail_start);

        let response = complete
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(String::from);
        if let Some(line) = &response {
            debug!("<- kanata: {line}");
        }
        Ok(response)
    }

    /// Parse a response line, degrading malformed input to an empty object.
    fn parse_line(line: Option<&str>) -> Value {
        match line {
            Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
                warn!("Malformed response from kanata ({e}): {text}");
                Value::Object(serde_json::Map::new())
            }),
            None => Value::Object(serde_json::Map::new()),
        }
    }

    // ------------------------------------------------------------------
    // Typed requests
    // ------------------------------------------------------------------

    /// Name of the layer currently active in kanata, or `None` when the
    /// server did not answer in time.
    pub async fn current_layer_name(&mut self) -> Result<Option<String>> {
        let line = self.send(&ClientRequest::RequestCurrentLayerName {}).await?;
        let value = Self::parse_line(line.as_deref());
        Ok(value
            .pointer("/CurrentLayerName/name")
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// Full info block for the active layer (name plus configuration text).
    pub async fn current_layer_info(&mut self) -> Result<Option<Value>> {
        let line = self.send(&ClientRequest::RequestCurrentLayerInfo {}).await?;
        let value = Self::parse_line(line.as_deref());
        Ok(value.get("CurrentLayerInfo").cloned())
    }

    /// All layer names defined in the running kanata configuration. An empty
    /// list means the server did not answer or answered with nothing.
    pub async fn layer_names(&mut self) -> Result<Vec<String>> {
        let line = self.send(&ClientRequest::RequestLayerNames {}).await?;
        let value = Self::parse_line(line.as_deref());
        Ok(value
            .pointer("/LayerNames/names")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Switch kanata to `layer`, unless it is already active.
    ///
    /// Returns `true` when a switch request was actually sent. The check
    /// keeps repeated focus events from hammering the server with no-ops.
    pub async fn change_layer(&mut self, layer: &str) -> Result<bool> {
        if self.current_layer_name().await?.as_deref() == Some(layer) {
            debug!("Layer '{layer}' is already active");
            return Ok(false);
        }
        self.send(&ClientRequest::ChangeLayer {
            new: layer.to_string(),
        })
        .await?;
        Ok(true)
    }

    /// Trigger a virtual key action. Fire-and-forget.
    pub async fn act_on_fake_key(&mut self, key: &FakeKey) -> Result<()> {
        self.send(&ClientRequest::ActOnFakeKey {
            name: key.name.clone(),
            action: key.action,
        })
        .await?;
        Ok(())
    }

    /// Move the pointer to absolute coordinates. Fire-and-forget.
    pub async fn set_mouse(&mut self, x: i32, y: i32) -> Result<()> {
        self.send(&ClientRequest::SetMouse { x, y }).await?;
        Ok(())
    }

    /// Shut the connection down cleanly. Safe to call when never connected.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!("Closed kanata connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_port_resolves_to_loopback() {
        let addr = parse_address("10000").unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:10000");
    }

    #[test]
    fn full_address_is_accepted() {
        let addr = parse_address("192.168.1.5:4321").unwrap();
        assert_eq!(addr.to_string(), "192.168.1.5:4321");
    }

    #[test]
    fn port_zero_is_rejected() {
        assert!(parse_address("0").is_err());
        assert!(parse_address("127.0.0.1:0").is_err());
    }

    #[test]
    fn garbage_addresses_are_rejected() {
        assert!(parse_address("localhost").is_err());
        assert!(parse_address("99999").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn fake_key_actions_parse_case_insensitively() {
        assert_eq!("press".parse::<FakeKeyAction>().unwrap(), FakeKeyAction::Press);
        assert_eq!("TAP".parse::<FakeKeyAction>().unwrap(), FakeKeyAction::Tap);
        assert_eq!("Toggle".parse::<FakeKeyAction>().unwrap(), FakeKeyAction::Toggle);
        assert_eq!("rElEaSe".parse::<FakeKeyAction>().unwrap(), FakeKeyAction::Release);
        assert!("hold".parse::<FakeKeyAction>().is_err());
    }

    #[test]
    fn requests_serialize_to_the_wire_format() {
        let json = serde_json::to_string(&ClientRequest::RequestLayerNames {}).unwrap();
        assert_eq!(json, r#"{"RequestLayerNames":{}}"#);

        let json = serde_json::to_string(&ClientRequest::ChangeLayer {
            new: "media".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"ChangeLayer":{"new":"media"}}"#);

        let json = serde_json::to_string(&ClientRequest::ActOnFakeKey {
            name: "mic".to_string(),
            action: FakeKeyAction::Tap,
        })
        .unwrap();
        assert_eq!(json, r#"{"ActOnFakeKey":{"name":"mic","action":"Tap"}}"#);

        let json = serde_json::to_string(&ClientRequest::SetMouse { x: 10, y: -5 }).unwrap();
        assert_eq!(json, r#"{"SetMouse":{"x":10,"y":-5}}"#);
    }
}
