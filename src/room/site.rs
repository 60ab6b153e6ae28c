use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::RoomError;
use crate::wire::{SitePresence, WsMessage, HELLO_FRAME};

/// A connected participant's half of the bidirectional channel used to send
/// frames. The receiving half (`SiteReceiver`) is split off at construction
/// time because exactly one task — the session loop — ever reads it, while
/// the send side is shared between the session loop, the room's broadcasts,
/// and the per-site heartbeat task.
#[derive(Clone)]
pub struct Site {
    site_id: u32,
    pub last_presence: Option<SitePresence>,
    sink: Arc<AsyncMutex<SplitSink<WebSocket, Message>>>,
    alive: Arc<AtomicBool>,
}

/// The read half of a site's transport, owned exclusively by the websocket
/// session task that drives `Room::connect`/`apply_events`/`apply_presence`.
pub struct SiteReceiver {
    stream: SplitStream<WebSocket>,
    alive: Arc<AtomicBool>,
}

impl Site {
    pub fn new(site_id: u32, socket: WebSocket) -> (Site, SiteReceiver) {
        let (sink, stream) = socket.split();
        let alive = Arc::new(AtomicBool::new(true));
        let site = Site {
            site_id,
            last_presence: None,
            sink: Arc::new(AsyncMutex::new(sink)),
            alive: alive.clone(),
        };
        let receiver = SiteReceiver { stream, alive };
        (site, receiver)
    }

    pub fn site_id(&self) -> u32 {
        self.site_id
    }

    /// Serialize `msg` and push it to the transport, omitting absent
    /// fields. Any transport error marks the site dead and raises
    /// `Disconnected`.
    pub async fn send(&self, msg: &WsMessage) -> Result<(), RoomError> {
        let text = serde_json::to_string(msg).expect("WsMessage always serializes");
        let mut sink = self.sink.lock().await;
        match sink.send(Message::Text(text.into())).await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.alive.store(false, Ordering::Relaxed);
                Err(RoomError::Disconnected)
            }
        }
    }

    /// Best-effort close; idempotent and swallows transport errors.
    pub async fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }

    /// True iff the transport has not yet observed a send or receive
    /// failure. Axum's `WebSocket` does not expose peer connection state
    /// directly, so liveness is tracked via this flag instead.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Send a `{heartbit: true}` frame every `interval` until the transport
    /// fails. Returns the task's `JoinHandle` so the caller can abort it
    /// when the session ends.
    pub fn spawn_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let site = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if site.send(&WsMessage::heartbit()).await.is_err() {
                    break;
                }
            }
        })
    }
}

impl SiteReceiver {
    /// Wait for the literal `"Hello"` text frame that must follow catch-up
    /// and precede `{setSiteId}`. Not JSON: compared as a raw string.
    pub async fn recv_hello(&mut self) -> Result<(), RoomError> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) if text == HELLO_FRAME => Ok(()),
            Some(Ok(_)) => Err(RoomError::ProtocolViolation(
                "first message must be the literal \"Hello\" frame".into(),
            )),
            Some(Err(_)) | None => Err(RoomError::Disconnected),
        }
    }

    /// Pull one text frame and parse it into a `WsMessage`. Any transport
    /// error raises `Disconnected`; malformed JSON raises
    /// `ProtocolViolation`.
    pub async fn receive(&mut self) -> Result<WsMessage, RoomError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).map_err(|e| {
                        warn!("malformed frame: {e}");
                        RoomError::ProtocolViolation(format!("malformed frame: {e}"))
                    });
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.alive.store(false, Ordering::Relaxed);
                    return Err(RoomError::Disconnected);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => continue,
                Some(Err(_)) => {
                    self.alive.store(false, Ordering::Relaxed);
                    return Err(RoomError::Disconnected);
                }
            }
        }
    }
}
