//! Event publisher contract: the fan-out of [`HistorySnapshot`]s to live
//! subscribers.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::history::HistorySnapshot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BusError {
    #[error("publisher has no active subscribers")]
    NoSubscribers,
}

/// Multi-producer/multi-subscriber hot stream of [`HistorySnapshot`]s.
///
/// A replay buffer of 1 (the latest snapshot) lets a subscriber that joins
/// mid-request immediately see the current state; the broadcast channel's
/// own bounded buffer (~10) absorbs a short burst without blocking the
/// publisher. Dropped intermediate updates are acceptable — a terminal
/// snapshot is not.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a snapshot to every live subscriber (and update the replay
    /// slot so late joiners see it).
    fn publish(&self, snapshot: HistorySnapshot);

    /// Subscribe to the live stream. Returns the last published snapshot
    /// (if any, for a subscriber joining mid-request) alongside a receiver
    /// for every subsequent publish; `tokio::sync::broadcast` has no way to
    /// seed a per-subscriber replay, so the snapshot has to travel
    /// out-of-band from the receiver rather than as its first `recv()`.
    fn subscribe(&self) -> (Option<HistorySnapshot>, broadcast::Receiver<HistorySnapshot>);
}
