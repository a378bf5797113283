//! Periodic tick sources.

use std::time::Duration;

use rbmc_types::Notification;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::queue::NotificationSender;

/// Spawn a task that queues `notification` every `period`, starting
/// immediately.  The task ends when the queue is closed.
///
/// Ticks missed because the queue was full are not replayed in a burst.
pub fn spawn_ticker(
    tx: NotificationSender,
    period: Duration,
    notification: Notification,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            if tx.send(notification).await.is_err() {
                debug!(?notification, "ticker stopping, queue closed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::notification_queue;

    #[tokio::test]
    async fn ticks_until_queue_closes() {
        let (tx, mut rx) = notification_queue(8);
        let handle = spawn_ticker(tx, Duration::from_millis(10), Notification::HeartbeatTick);

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(Notification::HeartbeatTick));
        }

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ticker must stop")
            .expect("ticker must not panic");
    }
}
