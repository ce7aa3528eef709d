//! Background relay posting stored rolls to a chat service.
//!
//! The HTTP path only enqueues; a single worker task renders and delivers
//! items in submission order. A roll that is submitted again under the same
//! character and timestamp edits the message posted for it earlier, as long
//! as that message is still in the worker's cache.

use crate::message::{render, MessageFormat, RenderedMessage};
use crate::{Result, RollStatsError};
use chrono::{DateTime, Utc};
use rollstats_types::RollSubmission;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    /// Messages remembered per chat server for later edits.
    pub max_messages_by_server: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            poll_interval: Duration::from_millis(1000),
            max_messages_by_server: 100,
        }
    }
}

/// Where a campaign's rolls are posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTarget {
    pub server_id: String,
    /// `None` lets the sink pick the server's default channel.
    pub channel_id: Option<String>,
    pub format: MessageFormat,
}

#[derive(Debug, Clone)]
pub struct RelayItem {
    pub target: RelayTarget,
    pub character: String,
    pub roll: RollSubmission,
    pub enqueued_at: DateTime<Utc>,
}

impl RelayItem {
    pub fn new(target: RelayTarget, character: impl Into<String>, roll: RollSubmission) -> Self {
        Self {
            target,
            character: character.into(),
            roll,
            enqueued_at: Utc::now(),
        }
    }

    /// Rolls without a timestamp are never matched with earlier messages.
    fn cache_key(&self) -> Option<String> {
        self.roll
            .timestamp()
            .map(|ts| format!("{}-{}", self.character, ts))
    }
}

/// Delivery side of the relay.
pub trait RelaySink: Send + Sync {
    /// Post a new message and return its id.
    fn send(
        &self,
        target: &RelayTarget,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<String>> + Send;

    fn edit(
        &self,
        target: &RelayTarget,
        message_id: &str,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Sink that only writes messages to the log.
#[derive(Debug, Default)]
pub struct LogSink {
    next_id: AtomicU64,
}

impl RelaySink for LogSink {
    async fn send(&self, target: &RelayTarget, message: &RenderedMessage) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        info!(
            target: "rollstats::relay",
            server = %target.server_id,
            channel = ?target.channel_id,
            message_id = %id,
            "Send: {}",
            serde_json::to_string(message)?
        );
        Ok(id)
    }

    async fn edit(&self, target: &RelayTarget, message_id: &str, message: &RenderedMessage) -> Result<()> {
        info!(
            target: "rollstats::relay",
            server = %target.server_id,
            message_id = %message_id,
            "Edit: {}",
            serde_json::to_string(message)?
        );
        Ok(())
    }
}

/// Ids of recently posted messages, per chat server, oldest first.
#[derive(Debug)]
pub struct MessageCache {
    capacity: usize,
    servers: HashMap<String, ServerMessages>,
}

#[derive(Debug, Default)]
struct ServerMessages {
    ids: HashMap<String, String>,
    order: VecDeque<String>,
}

impl MessageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            servers: HashMap::new(),
        }
    }

    pub fn get(&self, server: &str, key: &str) -> Option<&str> {
        self.servers
            .get(server)
            .and_then(|s| s.ids.get(key))
            .map(String::as_str)
    }

    pub fn insert(&mut self, server: &str, key: String, message_id: String) {
        if self.capacity == 0 {
            return;
        }
        let messages = self.servers.entry(server.to_string()).or_default();
        if messages.ids.insert(key.clone(), message_id).is_none() {
            messages.order.push_back(key);
        }
        while messages.order.len() > self.capacity {
            if let Some(oldest) = messages.order.pop_front() {
                messages.ids.remove(&oldest);
            }
        }
    }

    pub fn len(&self, server: &str) -> usize {
        self.servers.get(server).map(|s| s.order.len()).unwrap_or(0)
    }
}

/// Producer side, cheap to clone into request handlers.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayItem>,
}

impl RelayHandle {
    /// Queue an item without waiting for room.
    pub fn enqueue(&self, item: RelayItem) -> Result<()> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => RollStatsError::RelayQueueFull,
            TrySendError::Closed(_) => RollStatsError::RelayClosed,
        })
    }
}

pub struct RelayWorker {
    rx: mpsc::Receiver<RelayItem>,
    poll_interval: Duration,
    cache: MessageCache,
}

pub fn channel(settings: RelaySettings) -> (RelayHandle, RelayWorker) {
    let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
    let worker = RelayWorker {
        rx,
        poll_interval: settings.poll_interval,
        cache: MessageCache::new(settings.max_messages_by_server),
    };
    (RelayHandle { tx }, worker)
}

impl RelayWorker {
    /// Deliver queued items until every handle is dropped and the queue is drained.
    pub async fn run<S: RelaySink>(mut self, sink: S) -> MessageCache {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            loop {
                match self.rx.try_recv() {
                    Ok(item) => {
                        if let Err(e) = self.deliver(&sink, &item).await {
                            warn!(
                                target: "rollstats::relay",
                                "Dropping roll of {} for server {}: {}",
                                item.character,
                                item.target.server_id,
                                e
                            );
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!(target: "rollstats::relay", "Relay stopped");
                        return self.cache;
                    }
                }
            }
        }
    }

    async fn deliver<S: RelaySink>(&mut self, sink: &S, item: &RelayItem) -> Result<()> {
        let message = render(&item.character, &item.roll, item.target.format);
        let server = item.target.server_id.as_str();
        let key = item.cache_key();

        if let Some(id) = key.as_deref().and_then(|k| self.cache.get(server, k)) {
            debug!(target: "rollstats::relay", "Editing message {} on {}", id, server);
            return sink.edit(&item.target, id, &message).await;
        }

        let id = sink.send(&item.target, &message).await?;
        debug!(
            target: "rollstats::relay",
            "Sent message {} on {} ({} ms after enqueue)",
            id,
            server,
            (Utc::now() - item.enqueued_at).num_milliseconds()
        );
        if let Some(key) = key {
            self.cache.insert(server, key, id);
        }
        Ok(())
    }
}
