//! A single server's console socket.
//!
//! A [`Shard`] walks `Closed → Connecting → Connected → Closed`. Socket reactions
//! (open, message, error, close) run on a background task and are the only code that
//! moves a live shard forward; caller-facing operations either claim the next state
//! up front ([`Shard::connect`]) or tear everything down at once ([`Shard::disconnect`]).
//!
//! Every connection attempt gets a new generation number. Reactions from a socket
//! whose generation is no longer current are ignored, so a late close of an old socket
//! cannot clobber the state of a newer one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::{SinkExt as _, Stream, StreamExt as _};
use secrecy::{ExposeSecret as _, SecretString};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::ORIGIN};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::Config;
use super::error::WsError;
use super::event::{ShardEvent, dispatch};
use super::traits::Transport;
use crate::Result;
use crate::api::types::request::PowerSignal;
use crate::envelope::Frame;
use crate::error::Error;

/// Lifecycle state of a [`Shard`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShardStatus {
    #[default]
    Closed,
    Connecting,
    Connected,
}

#[derive(Debug, Default)]
struct ShardState {
    status: ShardStatus,
    /// Token of the current session, sent as the `auth` frame once the socket opens
    token: Option<SecretString>,
    /// Round trip of the last auth handshake
    ping: Option<Duration>,
    /// When the last `auth` frame went out
    last_ping: Option<Instant>,
    ready_at: Option<DateTime<Utc>>,
    /// Outbound half of the open socket
    socket: Option<mpsc::UnboundedSender<Message>>,
    generation: u64,
}

impl ShardState {
    fn reset(&mut self) {
        self.status = ShardStatus::Closed;
        self.token = None;
        self.ping = None;
        self.last_ping = None;
        self.ready_at = None;
        self.socket = None;
    }
}

/// Console connection of one server.
///
/// Cloning is cheap; clones share the same socket, state and event channel.
#[derive(Clone)]
pub struct Shard {
    inner: Arc<ShardInner>,
}

struct ShardInner {
    id: String,
    transport: Arc<dyn Transport>,
    config: Config,
    state: watch::Sender<ShardState>,
    events: broadcast::Sender<ShardEvent>,
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Shard {
    /// Creates a closed shard for the server `id`. Nothing is opened until
    /// [`Shard::connect`] is called.
    #[must_use]
    pub fn new(id: &str, transport: Arc<dyn Transport>, config: Config) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (state, _) = watch::channel(ShardState::default());

        Self {
            inner: Arc::new(ShardInner {
                id: id.to_owned(),
                transport,
                config,
                state,
                events,
            }),
        }
    }

    /// Identifier of the server this shard belongs to.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn status(&self) -> ShardStatus {
        self.inner.state.borrow().status
    }

    /// Round trip of the last auth handshake, `None` until one completed.
    #[must_use]
    pub fn ping(&self) -> Option<Duration> {
        self.inner.state.borrow().ping
    }

    /// When the socket last opened, `None` while not connected.
    #[must_use]
    pub fn ready_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.borrow().ready_at
    }

    /// Receiver for every event this shard emits from now on.
    ///
    /// Subscribe before calling [`Shard::connect`] to observe the handshake.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.inner.events.subscribe()
    }

    /// The events of [`Shard::subscribe`] as a stream. A receiver that falls too far
    /// behind yields [`WsError::Lagged`] and then continues with the newest events.
    /// The stream ends once the shard is dropped.
    pub fn events(&self) -> impl Stream<Item = Result<ShardEvent>> + use<> {
        let mut rx = self.subscribe();

        stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield Ok(event),
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Shard event stream lagged, missed {n} events");
                        yield Err(Error::from(WsError::Lagged { count: n }));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Opens the console socket.
    ///
    /// Does nothing unless the shard is [`ShardStatus::Closed`]. Fails only when the
    /// socket credentials cannot be fetched. Problems opening or running the socket,
    /// an unusable socket URL included, arrive as [`ShardEvent::Error`] and
    /// [`ShardEvent::ServerDisconnect`].
    pub async fn connect(&self) -> Result<()> {
        let mut generation = 0;
        let claimed = self.inner.state.send_if_modified(|state| {
            if state.status != ShardStatus::Closed {
                return false;
            }
            state.status = ShardStatus::Connecting;
            state.generation += 1;
            generation = state.generation;
            true
        });

        if !claimed {
            #[cfg(feature = "tracing")]
            tracing::debug!(shard = %self.inner.id, "connect ignored, shard is not closed");
            return Ok(());
        }

        self.emit(ShardEvent::Debug(format!(
            "connecting to the console of {}",
            self.inner.id
        )));

        let auth = match self.inner.transport.connection_auth(&self.inner.id).await {
            Ok(auth) => auth,
            Err(e) => {
                self.abandon(generation);
                return Err(e);
            }
        };

        let request = match self.socket_request(&auth.socket_url) {
            Ok(request) => request,
            Err(e) => {
                self.emit(ShardEvent::Error(format!("socket error: {e}")));
                self.inner.on_close(generation, "socket could not be opened");
                return Ok(());
            }
        };

        let current = self.inner.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.token = Some(auth.token.clone());
            true
        });
        if !current {
            // disconnected while the credentials were in flight
            return Ok(());
        }

        tokio::spawn(run(Arc::clone(&self.inner), request, generation));
        Ok(())
    }

    /// Connects and waits until the socket is open, for at most the configured
    /// request timeout.
    pub async fn connect_and_wait(&self) -> Result<()> {
        let mut status = self.inner.state.subscribe();
        self.connect().await?;

        let settled = timeout(
            self.inner.config.request_timeout,
            status.wait_for(|state| state.status != ShardStatus::Connecting),
        )
        .await;

        let opened = match settled {
            Ok(Ok(state)) => state.status == ShardStatus::Connected,
            Ok(Err(_)) => false,
            Err(_) => return Err(WsError::Timeout.into()),
        };

        if opened {
            Ok(())
        } else {
            Err(WsError::ConnectionClosed.into())
        }
    }

    /// Fetches a new token and authenticates with it on the open socket.
    pub async fn refresh(&self) -> Result<()> {
        if self.status() != ShardStatus::Connected {
            return Err(WsError::NotConnected.into());
        }

        let auth = self.inner.transport.connection_auth(&self.inner.id).await?;
        let frame = Frame::new("auth", vec![auth.token.expose_secret().to_owned()]);

        self.inner.state.send_modify(|state| {
            state.token = Some(auth.token);
            state.last_ping = Some(Instant::now());
        });
        self.send_frame(&frame)
    }

    /// Sends `{"event": event, "args": args}` on the open socket.
    pub fn send(&self, event: &str, args: Vec<String>) -> Result<()> {
        self.send_frame(&Frame::new(event, args))
    }

    /// Asks the daemon for a [`ShardEvent::StatsUpdate`].
    pub fn request_stats(&self) -> Result<()> {
        self.send("send stats", Vec::new())
    }

    /// Asks the daemon to replay recent console output.
    pub fn request_logs(&self) -> Result<()> {
        self.send("send logs", Vec::new())
    }

    pub fn send_command(&self, command: &str) -> Result<()> {
        self.send("send command", vec![command.to_owned()])
    }

    pub fn set_power_state(&self, signal: PowerSignal) -> Result<()> {
        self.send("set state", vec![signal.to_string()])
    }

    /// Sends a frame and waits for the first inbound frame named `reply`.
    pub async fn request(&self, event: &str, args: Vec<String>, reply: &str) -> Result<Frame> {
        let mut rx = self.subscribe();
        self.send(event, args)?;

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(ShardEvent::RawPayload(frame)) if frame.event == reply => return Ok(frame),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Err(Error::from(WsError::ConnectionClosed)),
                }
            }
        };

        timeout(self.inner.config.request_timeout, wait)
            .await
            .map_err(|_e| WsError::Timeout)?
    }

    /// Closes the socket and resets the shard to [`ShardStatus::Closed`].
    ///
    /// Calling this on a closed shard does nothing.
    pub fn disconnect(&self) {
        let mut socket = None;
        let torn_down = self.inner.state.send_if_modified(|state| {
            if state.status == ShardStatus::Closed && state.socket.is_none() {
                return false;
            }
            socket = state.socket.take();
            state.reset();
            state.generation += 1;
            true
        });

        if let Some(socket) = socket {
            _ = socket.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: String::new().into(),
            })));
        }

        if torn_down {
            #[cfg(feature = "tracing")]
            tracing::debug!(shard = %self.inner.id, "disconnected");
            self.emit(ShardEvent::ServerDisconnect);
        }
    }

    fn send_frame(&self, frame: &Frame) -> Result<()> {
        let message = encode(frame)?;

        let state = self.inner.state.borrow();
        let Some(socket) = state.socket.as_ref() else {
            return Err(WsError::SocketUnavailable.into());
        };
        socket
            .send(message)
            .map_err(|_e| WsError::SocketUnavailable)?;
        Ok(())
    }

    fn socket_request(&self, socket_url: &str) -> Result<Request> {
        let mut request = socket_url.into_client_request()?;
        if let Some(origin) = self.inner.transport.origin() {
            request
                .headers_mut()
                .insert(ORIGIN, HeaderValue::from_str(&origin)?);
        }
        Ok(request)
    }

    /// Falls back to `Closed` after a connect attempt failed before any socket existed.
    fn abandon(&self, generation: u64) {
        self.inner.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.reset();
            true
        });
    }

    fn emit(&self, event: ShardEvent) {
        self.inner.emit(event);
    }
}

impl ShardInner {
    fn emit(&self, event: ShardEvent) {
        #[cfg(feature = "tracing")]
        match &event {
            ShardEvent::Debug(message) => tracing::debug!(shard = %self.id, "{message}"),
            ShardEvent::Error(message) => tracing::error!(shard = %self.id, "{message}"),
            _ => {}
        }

        // Nobody listening is fine
        _ = self.events.send(event);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.borrow().generation == generation
    }

    fn on_open(&self, generation: u64, socket: mpsc::UnboundedSender<Message>) -> bool {
        let token = match self.state.borrow().token.as_ref() {
            Some(token) => token.expose_secret().to_owned(),
            None => return false,
        };
        let auth = match encode(&Frame::new("auth", vec![token])) {
            Ok(auth) => auth,
            Err(e) => {
                self.emit(ShardEvent::Error(format!("unable to encode auth frame: {e}")));
                return false;
            }
        };

        let opened = self.state.send_if_modified(|state| {
            if state.generation != generation || state.status != ShardStatus::Connecting {
                return false;
            }
            if socket.send(auth).is_err() {
                return false;
            }
            state.socket = Some(socket);
            state.status = ShardStatus::Connected;
            state.ready_at = Some(Utc::now());
            state.last_ping = Some(Instant::now());
            true
        });

        if opened {
            self.emit(ShardEvent::ServerConnect(self.id.clone()));
        }
        opened
    }

    fn on_message(self: &Arc<Self>, generation: u64, text: &str) {
        #[cfg(feature = "tracing")]
        tracing::trace!(shard = %self.id, %text, "received console frame");

        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(shard = %self.id, %text, error = %e, "failed to parse console frame");
                self.emit(ShardEvent::Debug(format!("dropped malformed frame: {e}")));
                return;
            }
        };

        if !self.is_current(generation) {
            return;
        }

        self.emit(ShardEvent::RawPayload(frame.clone()));

        match frame.event.as_str() {
            "auth success" => {
                let now = Instant::now();
                self.state.send_modify(|state| {
                    if let Some(last_ping) = state.last_ping {
                        state.ping = Some(now.duration_since(last_ping));
                    }
                    state.last_ping = Some(now);
                });
                self.emit(ShardEvent::AuthSuccess);
            }
            "token expiring" => {
                self.emit(ShardEvent::Debug("token expiring, refreshing".to_owned()));
                let shard = Shard {
                    inner: Arc::clone(self),
                };
                tokio::spawn(async move {
                    if let Err(e) = shard.refresh().await {
                        shard.emit(ShardEvent::Error(format!("token refresh failed: {e}")));
                    }
                });
            }
            "token expired" => {
                self.emit(ShardEvent::Debug("token expired, disconnecting".to_owned()));
                Shard {
                    inner: Arc::clone(self),
                }
                .disconnect();
            }
            event => self.emit(dispatch(event, frame.args())),
        }
    }

    fn on_error(&self, error: &tungstenite::Error) {
        self.emit(ShardEvent::Error(format!("socket error: {error}")));
    }

    fn on_close(&self, generation: u64, reason: &str) {
        let closed = self.state.send_if_modified(|state| {
            if state.generation != generation || state.status == ShardStatus::Closed {
                return false;
            }
            state.reset();
            true
        });

        if closed {
            self.emit(ShardEvent::Debug(format!("socket closed: {reason}")));
            self.emit(ShardEvent::ServerDisconnect);
        }
    }
}

fn encode(frame: &Frame) -> Result<Message> {
    let text = serde_json::to_string(frame).map_err(WsError::MessageParse)?;
    Ok(Message::Text(text.into()))
}

/// Socket task of one connection attempt.
async fn run(inner: Arc<ShardInner>, request: Request, generation: u64) {
    let stream = match connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            inner.on_error(&e);
            inner.on_close(generation, "socket could not be opened");
            return;
        }
    };

    let (mut write, mut read) = stream.split();
    let (socket_tx, mut socket_rx) = mpsc::unbounded_channel();

    if !inner.on_open(generation, socket_tx) {
        _ = write.close().await;
        return;
    }

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => inner.on_message(generation, text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "closed by peer".to_owned(),
                        |frame| format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
                    );
                    inner.on_close(generation, &reason);
                    break;
                }
                Some(Ok(_)) => {
                    // Binary frames and control frames carry nothing for us
                }
                Some(Err(e)) => {
                    inner.on_error(&e);
                    inner.on_close(generation, "socket error");
                    break;
                }
                None => {
                    inner.on_close(generation, "stream ended");
                    break;
                }
            },

            Some(message) = socket_rx.recv() => {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    inner.on_error(&e);
                    inner.on_close(generation, "send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        }
    }
}
