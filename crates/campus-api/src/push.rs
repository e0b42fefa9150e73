//! Socket.IO push channel with auto-reconnect.
//!
//! Connects to the backend's Socket.IO endpoint over a raw WebSocket,
//! performs the Engine.IO/Socket.IO handshake, answers pings, and streams
//! typed [`PushEvent`]s through a [`tokio::sync::broadcast`] channel.
//! Connection state is published on a [`tokio::sync::watch`] channel so
//! consumers can re-fetch snapshots after every (re)connect: events emitted
//! while the link was down are never replayed.
//!
//! # Example
//!
//! ```rust,ignore
//! use campus_api::push::{PushHandle, ReconnectConfig, socket_url};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = socket_url(&Url::parse("http://localhost:5000")?)?;
//! let handle = PushHandle::connect(url, ReconnectConfig::default(), CancellationToken::new());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::{AttackRecord, BlockedIp, SensorUpdate, SystemStats, WarningPayload};
use crate::socketio::{self, DEFAULT_NAMESPACE, PONG_FRAME, Packet};

// ── Fan-out ──────────────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 512;

// ── PushEvent ────────────────────────────────────────────────────────

/// A typed event received from the backend.
#[derive(Debug, Clone, Serialize)]
pub enum PushEvent {
    /// `attack_detected`: a new entry in the backend's attack log.
    AttackDetected(AttackRecord),
    /// `system_stats`: periodic host statistics (possibly partial).
    SystemStats(SystemStats),
    /// `sensor_update`: one sensor of one sector changed.
    SensorUpdate(SensorUpdate),
    /// `system_warning`: resource thresholds exceeded.
    SystemWarning(WarningPayload),
    /// `ip_blocked`: an address was added to the firewall deny list.
    IpBlocked(BlockedIp),
    /// `connection_status`: greeting sent by the backend on connect.
    ConnectionStatus { status: String },
}

impl PushEvent {
    /// Map a Socket.IO event onto a typed variant.
    ///
    /// Returns `Ok(None)` for event names this client does not consume.
    pub fn from_socket_event(name: &str, payload: Value) -> Result<Option<Self>, Error> {
        fn parse<T: DeserializeOwned>(name: &str, payload: Value) -> Result<T, Error> {
            serde_json::from_value(payload).map_err(|e| Error::Deserialization {
                message: format!("{name} payload: {e}"),
                body: String::new(),
            })
        }

        let event = match name {
            "attack_detected" => Self::AttackDetected(parse(name, payload)?),
            "system_stats" => Self::SystemStats(parse(name, payload)?),
            "sensor_update" => Self::SensorUpdate(parse(name, payload)?),
            "system_warning" => Self::SystemWarning(parse(name, payload)?),
            "ip_blocked" => Self::IpBlocked(parse(name, payload)?),
            "connection_status" => {
                #[derive(Deserialize)]
                struct Status {
                    status: String,
                }
                let status: Status = parse(name, payload)?;
                Self::ConnectionStatus {
                    status: status.status,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// ── Link state ───────────────────────────────────────────────────────

/// Coarse state of the push link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Link state plus the counters consumers need to react to reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: LinkState,
    /// Consecutive failed attempts since the last successful connect.
    pub attempt: u32,
    /// Incremented on every transition into `Connected`.
    pub generation: u64,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: LinkState::Disconnected,
            attempt: 0,
            generation: 0,
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for push reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait before retrying after the first drop (1s unless configured).
    pub initial_delay: Duration,

    /// Ceiling for the retry delay (30s unless configured).
    pub max_delay: Duration,

    /// Give up after this many consecutive failed sessions.
    /// With `None` the link keeps retrying until cancelled.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── URL helpers ──────────────────────────────────────────────────────

/// Build the Socket.IO WebSocket URL from the backend's HTTP origin.
///
/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
pub fn socket_url(origin: &Url) -> Result<Url, Error> {
    let mut url = origin.clone();
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported socket URL scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot use scheme {scheme:?}")))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push channel.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct PushHandle {
    event_rx: broadcast::Receiver<Arc<PushEvent>>,
    link_rx: watch::Receiver<LinkStatus>,
    cancel: CancellationToken,
}

impl PushHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; watch
    /// [`link`](Self::link) to learn when the channel is up.
    pub fn connect(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (link_tx, link_rx) = watch::channel(LinkStatus::default());

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            push_loop(ws_url, event_tx, link_tx, reconnect, task_cancel).await;
        });

        Self {
            event_rx,
            link_rx,
            cancel,
        }
    }

    /// A fresh receiver; it sees only events published after this call.
    ///
    /// If a consumer falls behind it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.event_rx.resubscribe()
    }

    /// Watch the link state.
    pub fn link(&self) -> watch::Receiver<LinkStatus> {
        self.link_rx.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Supervisor task ──────────────────────────────────────────────────

/// Main loop: connect → handshake → read → on error, backoff → reconnect.
async fn push_loop(
    ws_url: Url,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    link_tx: watch::Sender<LinkStatus>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        link_tx.send_modify(|s| {
            s.state = LinkState::Connecting;
            s.attempt = attempt;
        });

        let generation = link_tx.borrow().generation;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &event_tx, &link_tx, &cancel) => result,
        };

        link_tx.send_modify(|s| s.state = LinkState::Disconnected);
        if cancel.is_cancelled() {
            break;
        }

        // A session that reached `Connected` ends the run of failures.
        if link_tx.borrow().generation != generation {
            attempt = 0;
        }

        match result {
            // Clean disconnect (server close or stream ended).
            Ok(()) => {
                tracing::info!("push channel disconnected cleanly, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "push channel error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "push reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
                attempt = attempt.saturating_add(1);
            }
        }

        let delay = calculate_backoff(attempt.saturating_sub(1), &reconnect);
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        link_tx.send_modify(|s| s.attempt = attempt);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    link_tx.send_modify(|s| s.state = LinkState::Disconnected);
    tracing::debug!("push loop exiting");
}

// ── One socket session ───────────────────────────────────────────────

/// Establish one WebSocket connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    link_tx: &watch::Sender<LinkStatus>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting push channel");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            frame = read.next() => frame,
        };

        let text = match frame {
            Some(Ok(tungstenite::Message::Text(text))) => text,
            Some(Ok(tungstenite::Message::Close(frame))) => {
                return match frame {
                    Some(cf) if cf.code != tungstenite::protocol::frame::coding::CloseCode::Normal => {
                        Err(Error::WebSocketClosed {
                            code: cf.code.into(),
                            reason: cf.reason.to_string(),
                        })
                    }
                    _ => {
                        tracing::info!("push channel close frame received");
                        Ok(())
                    }
                };
            }
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => {
                tracing::info!("push stream ended");
                return Ok(());
            }
            // Binary, Ping, Pong, Frame: tungstenite answers WebSocket pings itself
            Some(Ok(_)) => continue,
        };

        let packet = match socketio::decode(&text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable push frame");
                continue;
            }
        };

        match packet {
            Packet::Open(handshake) => {
                tracing::debug!(sid = %handshake.sid, "engine.io session opened");
                write
                    .send(tungstenite::Message::Text(
                        socketio::connect_frame(DEFAULT_NAMESPACE).into(),
                    ))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            Packet::Connect { sid, .. } => {
                tracing::info!(sid = sid.as_deref().unwrap_or(""), "push channel connected");
                link_tx.send_modify(|s| {
                    s.state = LinkState::Connected;
                    s.attempt = 0;
                    s.generation = s.generation.wrapping_add(1);
                });
            }
            Packet::Ping => {
                tracing::trace!("engine.io ping");
                write
                    .send(tungstenite::Message::Text(PONG_FRAME.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            Packet::Event { name, payload, .. } => dispatch_event(&name, payload, event_tx),
            Packet::ConnectError { message, .. } => {
                return Err(Error::WebSocketConnect(format!(
                    "namespace connect refused: {message}"
                )));
            }
            Packet::Disconnect { .. } | Packet::Close => {
                tracing::info!("backend closed the socket.io session");
                return Ok(());
            }
            Packet::Pong | Packet::Noop => {}
        }
    }
}

// ── Event dispatch ───────────────────────────────────────────────────

/// Convert a Socket.IO event and broadcast it to subscribers.
fn dispatch_event(name: &str, payload: Value, event_tx: &broadcast::Sender<Arc<PushEvent>>) {
    match PushEvent::from_socket_event(name, payload) {
        Ok(Some(event)) => {
            // Ignore send errors: just means no active subscribers right now
            let _ = event_tx.send(Arc::new(event));
        }
        Ok(None) => tracing::debug!(event = name, "ignoring unconsumed push event"),
        Err(e) => tracing::warn!(event = name, error = %e, "malformed push payload"),
    }
}

// ── Retry delay ──────────────────────────────────────────────────────

/// Doubling delay for `attempt`, capped, with ±25% jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reconnect_defaults_retry_forever() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn retry_delay_grows_between_attempts() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) must exceed d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) must exceed d1 ({d1:?})");
    }

    #[test]
    fn retry_delay_never_exceeds_ceiling() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_millis(12_500), "got {d10:?}");
        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_millis(12_500), "got {huge:?}");
    }

    #[test]
    fn socket_url_from_http_origin() {
        let url = socket_url(&Url::parse("http://localhost:5000").unwrap()).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );

        let secure = socket_url(&Url::parse("https://campus.example/").unwrap()).unwrap();
        assert_eq!(secure.scheme(), "wss");
    }

    #[test]
    fn socket_url_rejects_other_schemes() {
        assert!(socket_url(&Url::parse("ftp://host").unwrap()).is_err());
    }

    #[test]
    fn typed_attack_event() {
        let event = PushEvent::from_socket_event(
            "attack_detected",
            json!({
                "type": "critical",
                "category": "DoS",
                "message": "Possible DoS attack: 150 connections",
                "time": "10:11:12",
                "severity": "CRITICAL",
                "source": "Multiple"
            }),
        )
        .unwrap()
        .unwrap();
        let PushEvent::AttackDetected(record) = event else {
            panic!("expected attack event");
        };
        assert_eq!(record.category, "DoS");
    }

    #[test]
    fn unknown_event_is_skipped() {
        assert!(
            PushEvent::from_socket_event("sensor_data", json!({}))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(PushEvent::from_socket_event("sensor_update", json!({"sector": 1})).is_err());
    }

    #[test]
    fn dispatch_broadcasts_known_events() {
        let (tx, mut rx) = broadcast::channel(16);
        dispatch_event(
            "sensor_update",
            json!({
                "sector": "buildingA",
                "sensor": "light",
                "data": {"value": 40, "unit": "%", "active": true}
            }),
            &tx,
        );
        let event = rx.try_recv().unwrap();
        assert!(matches!(&*event, PushEvent::SensorUpdate(u) if u.sensor == "light"));
    }

    #[test]
    fn dispatch_skips_malformed_payloads() {
        let (tx, mut rx) = broadcast::channel::<Arc<PushEvent>>(16);
        dispatch_event("system_stats", json!("not an object"), &tx);
        assert!(rx.try_recv().is_err());
    }
}
