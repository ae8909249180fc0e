//! Realtime event channel over STOMP.
//!
//! The client keeps one subscription to the events topic alive and forwards
//! every message body, decoded as a [`RealtimeEvent`], to an mpsc channel.
//! Lost connections are retried after a fixed delay until the receiving side
//! goes away.

use crate::error::Result;
use crate::stomp::{connect_frame, decode_frame, subscribe_frame, Frame, StompError};
use lineage_graph::RealtimeEvent;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const EVENTS_DESTINATION: &str = "/topic/events";
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct RealtimeClient {
    addr: String,
    host: String,
    destination: String,
    reconnect_delay: Duration,
}

/// Why a single connection ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Broker closed the socket.
    Closed,
    /// Nobody listens for events anymore.
    ReceiverGone,
}

impl RealtimeClient {
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let host = addr
            .rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| addr.clone());
        Self {
            addr,
            host,
            destination: EVENTS_DESTINATION.to_string(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Spawn the client; events arrive on the returned receiver.
    pub fn spawn(self, capacity: usize) -> (mpsc::Receiver<RealtimeEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(async move { self.run(tx).await });
        (rx, handle)
    }

    /// Connect, subscribe and forward events until `tx` is closed.
    pub async fn run(self, tx: mpsc::Sender<RealtimeEvent>) {
        loop {
            match self.session(&tx).await {
                Ok(SessionEnd::ReceiverGone) => break,
                Ok(SessionEnd::Closed) => {
                    tracing::info!(addr = %self.addr, "realtime connection closed")
                }
                Err(e) => tracing::warn!(addr = %self.addr, error = %e, "realtime connection failed"),
            }
            if tx.is_closed() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = tx.closed() => break,
            }
            tracing::debug!(addr = %self.addr, "reconnecting");
        }
        tracing::debug!("realtime client stopped");
    }

    async fn session(&self, tx: &mpsc::Sender<RealtimeEvent>) -> Result<SessionEnd> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(&connect_frame(&self.host).encode()).await?;
        stream
            .write_all(&subscribe_frame("sub-0", &self.destination).encode())
            .await?;
        tracing::info!(addr = %self.addr, destination = %self.destination, "subscribed to realtime events");

        let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
        let mut chunk = [0u8; 4096];
        loop {
            let n = tokio::select! {
                read = stream.read(&mut chunk) => read?,
                _ = tx.closed() => return Ok(SessionEnd::ReceiverGone),
            };
            if n == 0 {
                return Ok(SessionEnd::Closed);
            }
            buf.extend_from_slice(&chunk[..n]);

            while let Some((frame, used)) = decode_frame(&buf)? {
                buf.drain(..used);
                if self.dispatch(frame, tx).await? == Some(SessionEnd::ReceiverGone) {
                    return Ok(SessionEnd::ReceiverGone);
                }
            }
        }
    }

    async fn dispatch(
        &self,
        frame: Frame,
        tx: &mpsc::Sender<RealtimeEvent>,
    ) -> Result<Option<SessionEnd>> {
        match frame.command.as_str() {
            "CONNECTED" => {
                tracing::debug!(version = ?frame.get("version"), "broker accepted connection");
            }
            "MESSAGE" => {
                let body = match frame.body_str() {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping realtime message with undecodable body");
                        return Ok(None);
                    }
                };
                match RealtimeEvent::from_json(body) {
                    Ok(event) => {
                        tracing::debug!(kind = %event.kind, "realtime event");
                        if tx.send(event).await.is_err() {
                            return Ok(Some(SessionEnd::ReceiverGone));
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping malformed realtime message"),
                }
            }
            "ERROR" => {
                let message = frame.get("message").unwrap_or("unspecified").to_string();
                tracing::warn!(%message, "broker sent ERROR frame");
                return Err(StompError::Broker(message).into());
            }
            other => tracing::debug!(command = other, "ignoring frame"),
        }
        Ok(None)
    }
}
