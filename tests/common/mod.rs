#![cfg(feature = "ws")]
#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Deeply nested uses in sub-modules are falsely flagged as being unused"
)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt as _, StreamExt as _};
use pterodactyl_client_sdk::Result;
use pterodactyl_client_sdk::error::Error;
use pterodactyl_client_sdk::ws::{ConnectionAuth, ShardEvent, Transport};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// What the mock daemon observed from its clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A client finished the handshake
    Connected {
        path: String,
        origin: Option<String>,
    },
    /// A text frame, parsed as JSON
    Frame(Value),
    /// A close frame and its code
    Close(Option<u16>),
}

/// What the test wants the mock daemon to do.
#[derive(Debug, Clone)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Mock daemon console socket.
///
/// Every `{"event":"send stats"}` it receives is answered with a `stats` frame whose
/// `state` is the connection's path (without the leading `/`), after the delay given in
/// the `delay` query parameter in milliseconds.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Sent to ALL connected clients
    outbound_tx: broadcast::Sender<Outbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (outbound_tx, _) = broadcast::channel::<Outbound>(100);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        let connections = Arc::new(AtomicUsize::new(0));

        let broadcast_tx = outbound_tx.clone();
        let counter = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let mut uri = String::new();
                let mut origin = None;
                let Ok(ws_stream) =
                    tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
                        uri = req.uri().to_string();
                        origin = req
                            .headers()
                            .get("origin")
                            .and_then(|v| v.to_str().ok())
                            .map(ToOwned::to_owned);
                        Ok(resp)
                    })
                    .await
                else {
                    continue;
                };

                counter.fetch_add(1, Ordering::SeqCst);
                let (path, delay) = parse_uri(&uri);
                drop(inbound_tx.send(Inbound::Connected {
                    path: path.clone(),
                    origin,
                }));

                let (mut write, mut read) = ws_stream.split();
                let in_tx = inbound_tx.clone();
                let mut out_rx = broadcast_tx.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        let value: Value = serde_json::from_str(text.as_str()).unwrap();
                                        let wants_stats = value["event"] == "send stats";
                                        drop(in_tx.send(Inbound::Frame(value)));

                                        if wants_stats {
                                            sleep(delay).await;
                                            let reply = json!({
                                                "event": "stats",
                                                "args": [json!({ "state": path.trim_start_matches('/') }).to_string()]
                                            });
                                            if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                                                break;
                                            }
                                        }
                                    }
                                    Some(Ok(Message::Close(frame))) => {
                                        drop(in_tx.send(Inbound::Close(frame.map(|f| u16::from(f.code)))));
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = out_rx.recv() => {
                                match msg {
                                    Ok(Outbound::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outbound::Close) => {
                                        drop(write.send(Message::Close(None)).await);
                                        break;
                                    }
                                    Err(_) => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            outbound_tx,
            inbound_rx,
            connections,
        }
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Send a text frame to all connected clients.
    pub fn send(&self, message: &Value) {
        drop(self.outbound_tx.send(Outbound::Text(message.to_string())));
    }

    /// Close every open connection from the server side.
    pub fn close_all(&self) {
        drop(self.outbound_tx.send(Outbound::Close));
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next thing a client did, if it happens within [`TIMEOUT`].
    pub async fn recv(&mut self) -> Option<Inbound> {
        timeout(TIMEOUT, self.inbound_rx.recv()).await.ok().flatten()
    }

    /// Whatever a client already did, without waiting.
    pub fn try_recv(&mut self) -> Option<Inbound> {
        self.inbound_rx.try_recv().ok()
    }

    /// Next text frame a client sent, skipping handshakes.
    pub async fn recv_frame(&mut self) -> Option<Value> {
        loop {
            match self.recv().await? {
                Inbound::Frame(value) => return Some(value),
                Inbound::Connected { .. } => {}
                Inbound::Close(_) => return None,
            }
        }
    }
}

fn parse_uri(uri: &str) -> (String, Duration) {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
    let delay = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("delay="))
        .and_then(|ms| ms.parse().ok())
        .map_or(Duration::ZERO, Duration::from_millis);

    (path.to_owned(), delay)
}

/// Transport handing out the mock server's URL and a scripted series of tokens.
pub struct StubTransport {
    socket_url: String,
    tokens: Mutex<VecDeque<String>>,
    origin: Option<String>,
    calls: AtomicUsize,
}

impl StubTransport {
    pub fn new(socket_url: String, tokens: &[&str]) -> Self {
        Self {
            socket_url,
            tokens: Mutex::new(tokens.iter().map(|t| (*t).to_owned()).collect()),
            origin: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_owned());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn connection_auth(&self, _server_id: &str) -> Result<ConnectionAuth> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let token = self
            .tokens
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::validation("no more tokens"))?;

        Ok(ConnectionAuth::new(self.socket_url.clone(), token.into()))
    }

    fn origin(&self) -> Option<String> {
        self.origin.clone()
    }
}

/// Installs a `RUST_LOG` driven subscriber once per test binary.
pub fn init_tracing() {
    _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Waits for the first event matching `predicate`, skipping everything else.
pub async fn next_event<F>(rx: &mut broadcast::Receiver<ShardEvent>, mut predicate: F) -> ShardEvent
where
    F: FnMut(&ShardEvent) -> bool,
{
    timeout(TIMEOUT, async {
        loop {
            let event = rx.recv().await.unwrap();
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .unwrap()
}
