//! Connection supervisor for push-based sources
//!
//! Owns one logical subscription: connect, subscribe, read, reconnect with
//! exponential backoff. Once the consecutive-failure budget is exhausted
//! the supervisor reports `Stopped` and gives up - a fatal condition the
//! status query must surface, not a silent retry loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::config::ReconnectConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::models::ConnectionState;
use crate::sources::SourceAdapter;

/// Reconnect/backoff policy
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.base_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            max_attempts: config.max_attempts,
        }
    }
}

/// Backoff delay for the n-th consecutive attempt (1-based):
/// `min(base * 2^(n-1), max)`
pub fn backoff_delay(attempt: u32, policy: &ReconnectPolicy) -> Duration {
    // Exponent is clamped so the multiplication cannot overflow
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
    policy
        .base_delay
        .saturating_mul(factor)
        .min(policy.max_delay)
}

/// One bidirectional text transport
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> MonitorResult<()>;

    /// Next inbound text frame. `None` means the peer closed cleanly.
    async fn next_message(&mut self) -> Option<MonitorResult<String>>;

    async fn close(&mut self);
}

/// Opens transports for a supervisor
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> MonitorResult<Box<dyn Transport>>;
}

/// WebSocket connector for production sources
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> MonitorResult<Box<dyn Transport>> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;
        Ok(Box::new(WsTransport { stream }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> MonitorResult<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))
    }

    async fn next_message(&mut self) -> Option<MonitorResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        return Some(Err(MonitorError::Transport(e.to_string())));
                    }
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(MonitorError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Maintains one logical subscription to a push-based source
pub struct ConnectionSupervisor {
    adapter: Arc<dyn SourceAdapter>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionSupervisor {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        (
            Self {
                adapter,
                connector,
                policy,
                state_tx,
                cancel,
            },
            state_rx,
        )
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = *self.state_tx.borrow();
        if prev == next {
            return;
        }
        tracing::info!(
            source = %self.adapter.source(),
            from = %prev,
            to = %next,
            "Connection state changed"
        );
        let _ = self.state_tx.send(next);
    }

    /// Run until stopped. Consumes the supervisor; spawn it as its own
    /// task.
    pub async fn run(self) {
        let mut attempts = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                self.set_state(ConnectionState::Stopped);
                return;
            }

            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Stopped);
                    return;
                }
                result = self.connector.connect() => result,
            };

            let mut transport = match connected {
                Ok(transport) => transport,
                Err(e) => {
                    tracing::warn!(
                        source = %self.adapter.source(),
                        error = %e,
                        "Connect failed"
                    );
                    if !self.backoff(&mut attempts).await {
                        return;
                    }
                    continue;
                }
            };

            if let Err(e) = self.subscribe(transport.as_mut()).await {
                tracing::warn!(
                    source = %self.adapter.source(),
                    error = %e,
                    "Subscribe failed"
                );
                transport.close().await;
                if !self.backoff(&mut attempts).await {
                    return;
                }
                continue;
            }

            self.set_state(ConnectionState::Connected);
            attempts = 0;

            let stop_requested = self.read_loop(transport.as_mut()).await;
            transport.close().await;

            if stop_requested {
                self.set_state(ConnectionState::Stopped);
                return;
            }

            if !self.backoff(&mut attempts).await {
                return;
            }
        }
    }

    async fn subscribe(&self, transport: &mut dyn Transport) -> MonitorResult<()> {
        for frame in self.adapter.subscriptions() {
            transport.send(frame).await?;
        }
        Ok(())
    }

    /// Returns `true` when the loop ended because stop was requested
    async fn read_loop(&self, transport: &mut dyn Transport) -> bool {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return true,
                message = transport.next_message() => match message {
                    Some(Ok(text)) => {
                        self.adapter.handle_message(&text, &self.cancel).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(
                            source = %self.adapter.source(),
                            error = %e,
                            "Transport error"
                        );
                        return false;
                    }
                    None => {
                        tracing::info!(
                            source = %self.adapter.source(),
                            "Transport closed by peer"
                        );
                        return false;
                    }
                },
            }
        }
    }

    /// Wait out the backoff delay before the next attempt. Returns `false`
    /// when the supervisor must stop instead of retrying.
    async fn backoff(&self, attempts: &mut u32) -> bool {
        *attempts += 1;

        if *attempts > self.policy.max_attempts {
            tracing::error!(
                source = %self.adapter.source(),
                attempts = *attempts - 1,
                "Reconnect attempts exhausted, giving up"
            );
            self.set_state(ConnectionState::Stopped);
            return false;
        }

        let delay = backoff_delay(*attempts, &self.policy);
        self.set_state(ConnectionState::Reconnecting);
        tracing::info!(
            source = %self.adapter.source(),
            attempt = *attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after delay"
        );

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.set_state(ConnectionState::Stopped);
                false
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
