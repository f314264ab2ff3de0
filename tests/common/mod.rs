//! In-process mock of the kanata TCP server
//!
//! Accepts a single connection, answers layer queries from an internal
//! current-layer state, and records every request it sees. Tests can also
//! inject raw unsolicited lines to simulate kanata's LayerChange broadcasts.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub struct MockKanata {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    inject_tx: mpsc::UnboundedSender<String>,
}

impl MockKanata {
    /// Start a mock server with the given active layer and layer set.
    pub async fn start(initial_layer: &str, layers: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (inject_tx, mut inject_rx) = mpsc::unbounded_channel::<String>();

        let log = Arc::clone(&requests);
        let mut current = initial_layer.to_string();
        let layers: Vec<String> = layers.iter().map(|&l| l.to_string()).collect();

        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();

            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Ok(Some(line)) = line else { break };
                        let request: Value = serde_json::from_str(&line).unwrap_or_default();
                        log.lock().expect("request log poisoned").push(request.clone());

                        let reply = if request.get("RequestCurrentLayerName").is_some() {
                            Some(json!({"CurrentLayerName": {"name": current}}))
                        } else if request.get("RequestLayerNames").is_some() {
                            Some(json!({"LayerNames": {"names": layers}}))
                        } else if request.get("RequestCurrentLayerInfo").is_some() {
                            Some(json!({"CurrentLayerInfo": {"name": current, "cfg_text": ""}}))
                        } else if let Some(change) = request.get("ChangeLayer") {
                            current = change["new"].as_str().unwrap_or("").to_string();
                            Some(json!({"LayerChange": {"new": current}}))
                        } else {
                            // ActOnFakeKey and SetMouse get no reply
                            None
                        };
                        if let Some(reply) = reply
                            && write_half
                                .write_all(format!("{reply}\n").as_bytes())
                                .await
                                .is_err()
                        {
                            break;
                        }
                    }

                    injected = inject_rx.recv() => {
                        let Some(raw) = injected else { break };
                        if write_half.write_all(raw.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            inject_tx,
        }
    }

    /// Everything the server received so far, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    /// The layers requested via ChangeLayer, in order.
    pub fn change_layer_requests(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.pointer("/ChangeLayer/new").and_then(Value::as_str))
            .map(String::from)
            .collect()
    }

    /// Push raw bytes to the client, outside of any request/response cycle.
    pub fn inject(&self, raw: &str) {
        self.inject_tx
            .send(raw.to_string())
            .expect("mock server is gone");
    }
}
