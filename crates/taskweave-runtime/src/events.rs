//! Broadcast-backed [`EventPublisher`]: replay-buffer-of-1 plus a bounded
//! `tokio::sync::broadcast` channel.

use std::sync::RwLock;

use taskweave_kernel::{EventPublisher, HistorySnapshot};
use tokio::sync::broadcast;

/// Multi-producer/multi-subscriber hot stream of [`HistorySnapshot`]s.
///
/// `latest` is the replay slot: a subscriber joining mid-request calls
/// [`BroadcastEventPublisher::subscribe`] and gets the current snapshot
/// back directly alongside its receiver, then live updates as they're
/// published.
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<HistorySnapshot>,
    latest: RwLock<Option<HistorySnapshot>>,
}

impl BroadcastEventPublisher {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self {
            sender,
            latest: RwLock::new(None),
        }
    }

    /// The most recently published snapshot, if any — what a late joiner
    /// should be shown before live updates start arriving.
    pub fn latest(&self) -> Option<HistorySnapshot> {
        self.latest.read().unwrap().clone()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(10)
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, snapshot: HistorySnapshot) {
        *self.latest.write().unwrap() = Some(snapshot.clone());
        // No subscribers is not an error here: a publish with nobody
        // listening is routine (e.g. a request that finishes before anyone
        // calls `subscribe`), so the send's `Err(SendError)` is dropped.
        let _ = self.sender.send(snapshot);
    }

    fn subscribe(&self) -> (Option<HistorySnapshot>, broadcast::Receiver<HistorySnapshot>) {
        // Snapshot `latest` before subscribing so a publish racing this call
        // lands in the receiver rather than being silently missed by both.
        let latest = self.latest();
        (latest, self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskweave_kernel::{ExecutionHistory, RequestStatus, StatusCounts};

    fn snapshot(status: RequestStatus) -> HistorySnapshot {
        let mut history = ExecutionHistory::new_running("q", Utc::now());
        history.status = status;
        HistorySnapshot::from_history(&history, StatusCounts::default())
    }

    #[test]
    fn latest_reflects_most_recent_publish() {
        let publisher = BroadcastEventPublisher::default();
        assert!(publisher.latest().is_none());
        publisher.publish(snapshot(RequestStatus::Running));
        assert_eq!(publisher.latest().unwrap().status, RequestStatus::Running);
        publisher.publish(snapshot(RequestStatus::Completed));
        assert_eq!(publisher.latest().unwrap().status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn subscriber_receives_live_publishes() {
        let publisher = BroadcastEventPublisher::default();
        let (replay, mut rx) = publisher.subscribe();
        assert!(replay.is_none());
        publisher.publish(snapshot(RequestStatus::Running));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.status, RequestStatus::Running);
    }

    #[tokio::test]
    async fn late_subscriber_gets_the_replayed_snapshot() {
        let publisher = BroadcastEventPublisher::default();
        publisher.publish(snapshot(RequestStatus::Running));
        let (replay, _rx) = publisher.subscribe();
        assert_eq!(replay.unwrap().status, RequestStatus::Running);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let publisher = BroadcastEventPublisher::default();
        publisher.publish(snapshot(RequestStatus::Running));
    }
}
