//! Cart and wishlist collections
//!
//! Both collections share one persisted shape, `{ "items": [...], "updatedAt": ms }`,
//! and the same read/normalize/write cycle. They differ in what they expose:
//! the cart merges quantities, the wishlist toggles membership.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::domain::aggregates::{CollectionKind, LineItem};
use crate::domain::events::{CollectionChanged, CollectionEvents};
use crate::domain::value_objects::Quantity;
use crate::store::KeyValueStore;
use crate::Result;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    items: &'a [LineItem],
    updated_at: i64,
}

#[derive(Clone)]
pub struct LineItemCollection {
    kind: CollectionKind,
    store: Arc<dyn KeyValueStore>,
    events: CollectionEvents,
}

impl LineItemCollection {
    pub fn new(kind: CollectionKind, store: Arc<dyn KeyValueStore>, events: CollectionEvents) -> Self {
        Self { kind, store, events }
    }

    pub fn kind(&self) -> CollectionKind { self.kind }
    pub fn events(&self) -> &CollectionEvents { &self.events }

    /// Persisted items; missing, unreadable or corrupt storage reads as empty.
    pub async fn read(&self) -> Vec<LineItem> {
        let raw = match self.store.get(self.kind.storage_key()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return vec![],
            Err(err) => {
                warn!(collection = self.kind.label(), error = %err, "collection read failed");
                return vec![];
            }
        };
        match serde_json::from_slice::<Value>(&raw) {
            Ok(envelope) => envelope
                .get("items")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(LineItem::from_value).collect())
                .unwrap_or_default(),
            Err(err) => {
                debug!(collection = self.kind.label(), error = %err, "discarding corrupt collection");
                vec![]
            }
        }
    }

    /// Normalizes, persists and announces the collection; returns what was stored.
    pub async fn write(&self, items: Vec<LineItem>) -> Result<Vec<LineItem>> {
        self.write_announced(items).await.map(|(items, _)| items)
    }

    pub(crate) async fn write_announced(&self, items: Vec<LineItem>) -> Result<(Vec<LineItem>, CollectionChanged)> {
        let items: Vec<LineItem> = items.into_iter().filter_map(LineItem::normalized).collect();
        let now = Utc::now();
        let payload = serde_json::to_vec(&Envelope { items: &items, updated_at: now.timestamp_millis() })?;
        self.store.set(self.kind.storage_key(), payload).await?;
        let event = CollectionChanged::new(self.kind, items.len(), truncate_millis(now));
        self.events.publish(event.clone());
        Ok((items, event))
    }

    pub async fn remove(&self, key: &str) -> Result<Vec<LineItem>> {
        let items = self.read().await.into_iter().filter(|item| item.key != key).collect();
        self.write(items).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.write(vec![]).await.map(|_| ())
    }
}

fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(at.timestamp_millis()).single().unwrap_or(at)
}

#[derive(Clone)]
pub struct Cart(LineItemCollection);

impl Cart {
    pub fn new(store: Arc<dyn KeyValueStore>, events: CollectionEvents) -> Self {
        Self(LineItemCollection::new(CollectionKind::Cart, store, events))
    }

    pub fn collection(&self) -> &LineItemCollection { &self.0 }

    pub async fn items(&self) -> Vec<LineItem> { self.0.read().await }

    /// Appends the item, or merges it into the entry with the same key and adds the quantities.
    pub async fn add(&self, item: LineItem) -> Result<Vec<LineItem>> {
        let mut items = self.0.read().await;
        let Some(item) = item.normalized() else { return Ok(items) };
        match items.iter_mut().find(|existing| existing.key == item.key) {
            Some(existing) => existing.merge(item),
            None => items.push(item),
        }
        self.0.write(items).await
    }

    pub async fn update_qty(&self, key: &str, qty: f64) -> Result<Vec<LineItem>> {
        let qty = Quantity::clamped(qty).value();
        let mut items = self.0.read().await;
        items.iter_mut().filter(|item| item.key == key).for_each(|item| item.qty = qty);
        self.0.write(items).await
    }

    pub async fn remove(&self, key: &str) -> Result<Vec<LineItem>> { self.0.remove(key).await }
    pub async fn clear(&self) -> Result<()> { self.0.clear().await }

    pub async fn item_count(&self) -> u64 {
        self.0.read().await.iter().map(|item| u64::from(item.qty)).sum()
    }

    pub async fn subtotal(&self) -> f64 {
        self.0.read().await.iter().map(LineItem::line_total).sum()
    }
}

#[derive(Clone)]
pub struct Wishlist(LineItemCollection);

impl Wishlist {
    pub fn new(store: Arc<dyn KeyValueStore>, events: CollectionEvents) -> Self {
        Self(LineItemCollection::new(CollectionKind::Wishlist, store, events))
    }

    pub fn collection(&self) -> &LineItemCollection { &self.0 }

    pub async fn items(&self) -> Vec<LineItem> { self.0.read().await }

    /// Removes the entry if its key is present, appends it otherwise.
    /// Returns whether the item is in the wishlist afterwards.
    pub async fn toggle(&self, item: LineItem) -> Result<bool> {
        let mut items = self.0.read().await;
        let Some(item) = item.normalized() else { return Ok(false) };
        let key = item.key.clone();
        let before = items.len();
        items.retain(|existing| existing.key != key);
        let added = items.len() == before;
        if added { items.push(LineItem { qty: 1, ..item }); }
        let stored = self.0.write(items).await?;
        Ok(added && stored.iter().any(|existing| existing.key == key))
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.0.read().await.iter().any(|item| item.key == key)
    }

    pub async fn remove(&self, key: &str) -> Result<Vec<LineItem>> { self.0.remove(key).await }
    pub async fn clear(&self) -> Result<()> { self.0.clear().await }
}
