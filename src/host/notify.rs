use crate::core::BlockSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Outbound notification to the host page
///
/// Serializes as `{"messageType": "...", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "message", rename_all = "camelCase")]
pub enum Notification {
    /// Sent once at construction
    TimelineReady(bool),
    /// Block labels and bounds, sent once at construction
    InitTimeline(Vec<BlockSummary>),
    /// Playing flag after every play/pause/stop transition
    TimelinePlaying(bool),
    /// Current position, once per tick and once per reset
    SetTimelineFrame(f64),
    /// Title of a block whose reference could not be resolved
    TimelineFunctionMissing(String),
}

/// Fire-and-forget channel to the host
///
/// Implementations must not block: the tick pipeline calls `notify`
/// synchronously and never waits for delivery.
pub trait HostLink: Send {
    fn notify(&self, notification: Notification);
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostLink for NullHost {
    fn notify(&self, notification: Notification) {
        trace!("Dropping host notification: {:?}", notification);
    }
}

/// Forwards notifications into a bounded tokio channel
///
/// A full channel drops the notification rather than stalling the tick.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::Sender<Notification>,
}

impl ChannelHost {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }

    /// Create a host link together with the receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl HostLink for ChannelHost {
    fn notify(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!("Host channel full, dropping notification: {:?}", n);
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                debug!("Host channel closed, dropping notification: {:?}", n);
            }
        }
    }
}

/// A notification with the time it was emitted
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    pub notification: Notification,
    pub timestamp: DateTime<Utc>,
}

/// Host that keeps every notification in memory (for tests and inspection)
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    log: Arc<Mutex<Vec<RecordedNotification>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notifications received so far
    pub fn notifications(&self) -> Vec<Notification> {
        match self.log.lock() {
            Ok(log) => log.iter().map(|r| r.notification.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn records(&self) -> Vec<RecordedNotification> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }
}

impl HostLink for RecordingHost {
    fn notify(&self, notification: Notification) {
        if let Ok(mut log) = self.log.lock() {
            log.push(RecordedNotification {
                notification,
                timestamp: Utc::now(),
            });
        }
    }
}
