//! Mock signal feed for integration tests.
//!
//! Accepts WebSocket connections, pushes a fixed list of frames to every
//! client on connect, then answers pings until the client goes away.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub struct MockFeedServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    connections: Arc<Mutex<u32>>,
}

impl MockFeedServer {
    /// Start a server on an ephemeral port that sends `frames` to each client.
    pub async fn start(frames: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(Mutex::new(0u32));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let connections_clone = connections.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            frames.clone(),
                            connections_clone.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws/signals", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, frames: Vec<String>, connections: Arc<Mutex<u32>>) {
    *connections.lock().await += 1;

    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    for frame in frames {
        if write.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}

/// TCP listener that accepts connections and never answers the handshake.
pub struct SilentListener {
    addr: SocketAddr,
    accepted: Arc<Mutex<u32>>,
    task: tokio::task::JoinHandle<()>,
}

impl SilentListener {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(Mutex::new(0u32));

        let accepted_clone = accepted.clone();
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                *accepted_clone.lock().await += 1;
                held.push(stream);
            }
        });

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws/signals", self.addr)
    }

    pub async fn accepted(&self) -> u32 {
        *self.accepted.lock().await
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// A `signals_update` frame carrying one BUY signal for `symbol`.
pub fn signals_update_frame(symbol: &str, price: f64) -> String {
    serde_json::json!({
        "type": "signals_update",
        "data": [{
            "symbol": symbol,
            "timeframe": "1h",
            "signal": "BUY",
            "confidence": 0.74,
            "price": price,
            "indicators": {"rsi": 31.0, "macd": 4.2, "ema20": price, "ema50": price},
            "chart_data": []
        }],
        "timestamp": 1234.5
    })
    .to_string()
}
