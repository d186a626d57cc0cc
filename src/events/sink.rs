//! Event sinks
//!
//! Delivery is fire-and-forget: the engine logs and ignores any error a
//! sink returns, and no sink may block a round.

use crate::error::{HaggleError, Result};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionEvent;

/// Destination for session events
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &SessionEvent) -> Result<()>;
}

/// Drops every event
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, _event: &SessionEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps events in memory; clones share the same buffer
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn deliver(&self, event: &SessionEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|e| HaggleError::SinkDelivery(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Hands events to a background writer task over an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Spawn a task writing each event as one JSON line to `writer`.
    ///
    /// The task ends once every `ChannelSink` clone is dropped. Write
    /// failures are logged and the event is skipped.
    pub fn spawn_json_writer<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(writer, rx));
        (Self::new(tx), handle)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: &SessionEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| HaggleError::SinkDelivery("event writer has shut down".to_string()))
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<SessionEvent>)
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(event) = rx.recv().await {
        if let Err(e) = write_event(&mut writer, &event).await {
            tracing::warn!("Failed to write event for {}: {}", event.participant_id, e);
        }
    }
    if let Err(e) = writer.flush().await {
        tracing::warn!("Failed to flush event log: {}", e);
    }
}

async fn write_event<W>(writer: &mut W, event: &SessionEvent) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
