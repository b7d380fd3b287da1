//! Forwards collection change events to NATS so other processes can refresh.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use crate::domain::events::{CollectionChanged, CollectionEvents};

pub fn subject_for(event: &CollectionChanged) -> String {
    format!("silverline.{}.updated", event.kind.label())
}

pub fn spawn_relay(client: async_nats::Client, events: &CollectionEvents) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "nats relay fell behind collection events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "failed to encode collection event");
                    continue;
                }
            };
            if let Err(err) = client.publish(subject_for(&event), payload.into()).await {
                warn!(error = %err, event = event.event_name(), "failed to publish collection event");
            }
        }
        debug!("nats relay stopped");
    })
}
