//! Domain events
//!
//! Every successful collection write is announced on an in-process
//! broadcast channel; views and the reconciler re-read on receipt.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;
use crate::domain::aggregates::CollectionKind;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionChanged {
    pub event_id: Uuid,
    pub kind: CollectionKind,
    pub item_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl CollectionChanged {
    pub fn new(kind: CollectionKind, item_count: usize, updated_at: DateTime<Utc>) -> Self {
        Self { event_id: Uuid::now_v7(), kind, item_count, updated_at }
    }

    pub fn event_name(&self) -> &'static str { self.kind.event_name() }
}

#[derive(Clone, Debug)]
pub struct CollectionEvents {
    tx: broadcast::Sender<CollectionChanged>,
}

impl CollectionEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn publish(&self, event: CollectionChanged) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionChanged> { self.tx.subscribe() }
}

impl Default for CollectionEvents { fn default() -> Self { Self::new(64) } }
