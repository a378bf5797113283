//! Bounded notification queue.
//!
//! Uses [`tokio::sync::mpsc`] under the hood: any number of source tasks hold
//! a cloned [`NotificationSender`], the orchestrator owns the single
//! [`NotificationReceiver`].  Notifications are delivered in the order each
//! sender produced them.

use rbmc_types::{Notification, RbmcError};
use tokio::sync::mpsc;
use tracing::debug;

/// Default queue capacity (notifications buffered before senders wait).
pub const DEFAULT_CAPACITY: usize = 256;

/// Create a queue with room for `capacity` pending notifications.
pub fn notification_queue(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (NotificationSender { tx }, NotificationReceiver { rx })
}

/// Producer handle.  Clone it cheaply, one per source task.
#[derive(Clone, Debug)]
pub struct NotificationSender {
    tx: mpsc::Sender<Notification>,
}

impl NotificationSender {
    /// Queue `notification`, waiting for room if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`RbmcError::Channel`] once the receiver has been dropped.
    pub async fn send(&self, notification: Notification) -> Result<(), RbmcError> {
        self.tx.send(notification).await.map_err(|e| {
            debug!(notification = ?e.0, "notification queue closed");
            RbmcError::Channel(format!("queue closed, dropped {:?}", e.0))
        })
    }

    /// `true` once the receiver is gone and sources should stop.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle owned by the orchestrator.
#[derive(Debug)]
pub struct NotificationReceiver {
    rx: mpsc::Receiver<Notification>,
}

impl NotificationReceiver {
    /// Wait for the next notification.  Returns `None` when every sender has
    /// been dropped.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Take a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}
