//! Long-running push channel task.
//!
//! [`PushChannel::start`] spawns one task that connects, declares the
//! subscription, forwards parsed frames to the single consumer, and on any
//! close or error schedules exactly one reconnect after a fixed delay.
//! Connectivity is published through a [`watch`] channel so the runtime and
//! the poll fallback can both observe it.

use std::ops::ControlFlow;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ChannelClient, ChannelClientError, ChannelConnection};
use crate::events::ChannelEvent;
use crate::messages::{parse_frame, FrameError};
use crate::reconnect::{ReconnectConfig, ReconnectSchedule};

/// How long [`ChannelHandle::close`] waits for the task to exit.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for one dashboard session.
pub struct PushChannel {
    client: ChannelClient,
    /// Serialized subscription declaration, sent once per connection.
    subscription: String,
    reconnect: ReconnectConfig,
}

/// Control handle returned by [`PushChannel::start`].
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<String>,
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The connection dropped; reconnect.
    Closed,
    /// Cancelled, or the consumer went away; stop for good.
    Shutdown,
}

impl PushChannel {
    pub fn new(url: String, subscription: &serde_json::Value, reconnect: ReconnectConfig) -> Self {
        Self {
            client: ChannelClient::new(url),
            subscription: subscription.to_string(),
            reconnect,
        }
    }

    /// Spawn the connection task.
    ///
    /// `events` is the sole consumer of inbound frames and lifecycle
    /// events. The task runs until `cancel` fires or `events` is closed.
    pub fn start(
        self,
        events: mpsc::Sender<ChannelEvent>,
        cancel: CancellationToken,
    ) -> ChannelHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            tracing::info!(url = %self.client.url(), "Starting push channel");
            self.run(events, outbound_rx, connected_tx, token).await;
            tracing::info!("Push channel task exited");
        });

        ChannelHandle {
            outbound: outbound_tx,
            connected: connected_rx,
            cancel,
            task,
        }
    }

    /// Core loop: connect -> session -> wait one fixed delay -> repeat.
    async fn run(
        self,
        events: mpsc::Sender<ChannelEvent>,
        mut outbound: mpsc::UnboundedReceiver<String>,
        connected: watch::Sender<bool>,
        cancel: CancellationToken,
    ) {
        let mut schedule = ReconnectSchedule::new(self.reconnect);

        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.client.connect() => result,
            };

            match attempt {
                Ok(conn) => {
                    let end = run_session(
                        conn,
                        &self.subscription,
                        &mut outbound,
                        &events,
                        &connected,
                        &cancel,
                    )
                    .await;
                    let was_connected =
                        connected.send_if_modified(|up| std::mem::replace(up, false));

                    if end == SessionEnd::Shutdown {
                        break;
                    }
                    if was_connected && events.send(ChannelEvent::Disconnected).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Push channel connect failed");
                }
            }

            schedule.schedule();
            tracing::info!(
                delay_ms = schedule.delay().as_millis() as u64,
                attempt = schedule.attempts() + 1,
                "Push channel reconnect scheduled",
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = schedule.fired() => {}
            }
        }

        schedule.cancel();
        connected.send_if_modified(|up| std::mem::replace(up, false));
    }
}

impl ChannelHandle {
    /// Queue an outbound text frame. Frames queued while disconnected are
    /// sent once the next connection is up.
    pub fn send(&self, text: impl Into<String>) -> Result<(), ChannelClientError> {
        self.outbound
            .send(text.into())
            .map_err(|_| ChannelClientError::Protocol("push channel task is not running".into()))
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// A receiver that observes every connectivity change.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Close the connection, disarm any pending reconnect and wait for the
    /// task to exit.
    pub async fn close(self) {
        self.cancel.cancel();
        if tokio::time::timeout(CLOSE_TIMEOUT, self.task).await.is_err() {
            tracing::warn!("Push channel task did not exit in time");
        }
    }
}

/// Drive one connection until it closes or the task is cancelled.
async fn run_session(
    conn: ChannelConnection,
    subscription: &str,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::Sender<ChannelEvent>,
    connected: &watch::Sender<bool>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let connection_id = conn.connection_id;
    let (mut sink, mut stream) = conn.ws_stream.split();

    if let Err(e) = sink.send(Message::Text(subscription.to_owned())).await {
        tracing::warn!(connection_id = %connection_id, error = %e, "Failed to declare subscription");
        return SessionEnd::Closed;
    }
    tracing::debug!(connection_id = %connection_id, "Subscription declared");

    connected.send_replace(true);
    if events.send(ChannelEvent::Connected).await.is_err() {
        return SessionEnd::Shutdown;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Push channel send failed");
                    return SessionEnd::Closed;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let ControlFlow::Break(end) = handle_text(&connection_id, &text, events).await {
                            return end;
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(connection_id = %connection_id, ?frame, "Push channel closed by server");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {
                        // Binary / Frame: not part of the protocol.
                    }
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %connection_id, error = %e, "Push channel receive error");
                        return SessionEnd::Closed;
                    }
                    None => {
                        tracing::info!(connection_id = %connection_id, "Push channel stream exhausted");
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }
}

/// Parse one text frame and hand it to the consumer. Bad frames are
/// dropped without closing the connection; only a departed consumer ends
/// the session.
async fn handle_text(
    connection_id: &str,
    text: &str,
    events: &mpsc::Sender<ChannelEvent>,
) -> ControlFlow<SessionEnd> {
    match parse_frame(text) {
        Ok(message) => {
            if events.send(ChannelEvent::Message(message)).await.is_err() {
                return ControlFlow::Break(SessionEnd::Shutdown);
            }
        }
        Err(FrameError::UnknownType(kind)) => {
            tracing::debug!(connection_id, kind = %kind, "Ignoring unknown push message type");
        }
        Err(e) => {
            tracing::warn!(
                connection_id,
                error = %e,
                raw_message = %text,
                "Dropping malformed push frame",
            );
        }
    }
    ControlFlow::Continue(())
}
