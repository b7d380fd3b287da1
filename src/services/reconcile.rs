//! Catalog reconciliation
//!
//! Best-effort freshness pass over a persisted collection. Entries that point
//! at a catalog product are re-priced against the live catalog and a freshly
//! fetched rate; entries whose product has disappeared are dropped. A failed
//! rate or catalog fetch abandons the pass and leaves storage untouched.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::domain::aggregates::{CollectionKind, LineItem, Product};
use crate::services::catalog::CatalogSource;
use crate::services::pricing::{compute_pricing, silver_weight_grams};
use crate::services::rates::RateCache;
use crate::store::LineItemCollection;

/// Stored and recomputed values closer than this are considered equal.
pub const PRICE_TOLERANCE: f64 = 0.0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus { RemovedAndRepriced, Removed, Repriced }

impl ReconcileStatus {
    fn from_counts(removed: usize, repriced: usize) -> Option<Self> {
        match (removed > 0, repriced > 0) {
            (true, true) => Some(Self::RemovedAndRepriced),
            (true, false) => Some(Self::Removed),
            (false, true) => Some(Self::Repriced),
            (false, false) => None,
        }
    }

    pub fn message(self, kind: CollectionKind) -> String {
        let place = kind.label();
        match self {
            Self::RemovedAndRepriced => format!(
                "Some items in your {place} are no longer available and were removed. Prices were updated to the latest silver rate."
            ),
            Self::Removed => format!("Some items in your {place} are no longer available and were removed."),
            Self::Repriced => format!("Prices in your {place} were updated to the latest silver rate."),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// No entry references a catalog product; nothing was fetched.
    NothingToCheck,
    /// The rate or catalog could not be fetched, or the write failed; storage is unchanged.
    Abandoned,
    Unchanged,
    Changed { status: ReconcileStatus, removed: usize, repriced: usize, event_id: Uuid },
}

impl ReconcileOutcome {
    pub fn status(&self) -> Option<ReconcileStatus> {
        match self { Self::Changed { status, .. } => Some(*status), _ => None }
    }
}

#[derive(Debug, PartialEq)]
pub struct Reconciled {
    pub items: Vec<LineItem>,
    pub removed: usize,
    pub repriced: usize,
}

fn differs(stored: f64, fresh: f64) -> bool { (stored - fresh).abs() > PRICE_TOLERANCE }

fn optional_differs(stored: Option<f64>, fresh: Option<f64>) -> bool {
    match (stored, fresh) {
        (Some(a), Some(b)) => differs(a, b),
        (None, None) => false,
        _ => true,
    }
}

/// Pure reconciliation step over already-fetched catalog data.
pub fn reconcile_items(items: Vec<LineItem>, catalog: &HashMap<&str, &Product>, rate_per_gram: f64) -> Reconciled {
    let mut removed = 0;
    let mut repriced = 0;
    let mut kept = Vec::with_capacity(items.len());
    for mut item in items {
        let Some(id) = item.catalog_id() else {
            kept.push(item);
            continue;
        };
        let Some(product) = catalog.get(id.as_str()) else {
            removed += 1;
            continue;
        };
        let pricing = compute_pricing(product, rate_per_gram);
        let weight = silver_weight_grams(product);
        let changed = differs(item.price, pricing.price)
            || optional_differs(item.original_price, pricing.original_price)
            || differs(item.silver_weight_grams.unwrap_or(0.0), weight);
        if changed {
            item.price = pricing.price;
            item.original_price = pricing.original_price;
            item.silver_weight_grams = (weight > 0.0).then_some(weight);
            repriced += 1;
        }
        kept.push(item);
    }
    Reconciled { items: kept, removed, repriced }
}

pub struct Reconciler {
    rates: RateCache,
    catalog: Arc<dyn CatalogSource>,
}

impl Reconciler {
    pub fn new(rates: RateCache, catalog: Arc<dyn CatalogSource>) -> Self { Self { rates, catalog } }

    pub async fn reconcile(&self, collection: &LineItemCollection) -> ReconcileOutcome {
        let kind = collection.kind().label();
        let items = collection.read().await;
        if !items.iter().any(|item| item.catalog_id().is_some()) {
            return ReconcileOutcome::NothingToCheck;
        }

        let (rate, products) = tokio::join!(self.rates.refresh(), self.catalog.fetch_products());
        let products = match products {
            Ok(products) => products,
            Err(err) => {
                warn!(collection = kind, error = %err, "catalog fetch failed, skipping reconciliation");
                return ReconcileOutcome::Abandoned;
            }
        };
        let Some(rate) = rate else {
            warn!(collection = kind, "silver rate unavailable, skipping reconciliation");
            return ReconcileOutcome::Abandoned;
        };
        let lookup: HashMap<&str, &Product> =
            products.iter().filter_map(|p| p.id.as_deref().map(|id| (id, p))).collect();

        let Reconciled { items, removed, repriced } = reconcile_items(items, &lookup, rate);
        let Some(status) = ReconcileStatus::from_counts(removed, repriced) else {
            debug!(collection = kind, rate, "collection already up to date");
            return ReconcileOutcome::Unchanged;
        };
        match collection.write_announced(items).await {
            Ok((_, event)) => {
                info!(collection = kind, removed, repriced, rate, "collection reconciled");
                ReconcileOutcome::Changed { status, removed, repriced, event_id: event.event_id }
            }
            Err(err) => {
                warn!(collection = kind, error = %err, "failed to persist reconciled collection");
                ReconcileOutcome::Abandoned
            }
        }
    }

    /// Reconciles once immediately, then again after every change to the same
    /// collection made by someone else. Stops when the receiver is dropped.
    pub fn spawn_watch(self: Arc<Self>, collection: LineItemCollection) -> (JoinHandle<()>, mpsc::UnboundedReceiver<ReconcileStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events = collection.events().subscribe();
        let handle = tokio::spawn(async move {
            let mut own_write: Option<Uuid> = None;
            let mut pending = true;
            loop {
                if pending {
                    let outcome = self.reconcile(&collection).await;
                    if let ReconcileOutcome::Changed { status, event_id, .. } = outcome {
                        own_write = Some(event_id);
                        if tx.send(status).is_err() { break; }
                    }
                }
                pending = tokio::select! {
                    _ = tx.closed() => break,
                    event = events.recv() => match event {
                        Ok(event) if event.kind != collection.kind() => false,
                        Ok(event) if own_write == Some(event.event_id) => {
                            own_write = None;
                            false
                        }
                        Ok(_) => true,
                        Err(broadcast::error::RecvError::Lagged(_)) => true,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
            }
            debug!(collection = collection.kind().label(), "reconciliation watch stopped");
        });
        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::domain::events::CollectionEvents;
    use crate::store::{Cart, MemoryStore, Wishlist};
    use crate::services::catalog::decode_product_page;
    use crate::testing::{CountingRateSource, FailingRateSource, StaticCatalog};
    use std::time::Duration;

    const RING_ID: &str = "64b7f0c2a1b2c3d4e5f60718";
    const GONE_ID: &str = "64b7f0c2a1b2c3d4e5f6ffff";

    fn ring() -> Product {
        serde_json::from_value(json!({
            "_id": RING_ID, "slug": "ring", "title": "Ring",
            "makingCost": 1000, "grams": 10, "discountPercent": 10
        })).unwrap()
    }

    fn entry(key: &str, id: Option<&str>, price: f64) -> LineItem {
        LineItem { id: id.map(str::to_string), ..LineItem::new(key, key, price) }
    }

    fn fresh_ring_entry() -> LineItem {
        LineItem { original_price: Some(1500.0), silver_weight_grams: Some(10.0), ..entry("ring", Some(RING_ID), 1350.0) }
    }

    struct Fixture {
        cart: Cart,
        catalog: Arc<StaticCatalog>,
        rates: Arc<CountingRateSource>,
        reconciler: Arc<Reconciler>,
    }

    fn fixture(products: Vec<Product>, rate: f64) -> Fixture {
        let catalog = Arc::new(StaticCatalog::new(products));
        let rates = Arc::new(CountingRateSource::new(rate));
        let reconciler = Arc::new(Reconciler::new(RateCache::new(rates.clone()), catalog.clone()));
        let cart = Cart::new(Arc::new(MemoryStore::new()), CollectionEvents::default());
        Fixture { cart, catalog, rates, reconciler }
    }

    #[tokio::test]
    async fn test_drops_missing_catalog_products() {
        let f = fixture(vec![ring()], 50.0);
        f.cart.collection().write(vec![
            entry("gone", Some(GONE_ID), 100.0),
            entry("custom", Some("custom-order-7"), 100.0),
            entry("plain", None, 50.0),
        ]).await.unwrap();
        let outcome = f.reconciler.reconcile(f.cart.collection()).await;
        assert_eq!(outcome.status(), Some(ReconcileStatus::Removed));
        let keys: Vec<String> = f.cart.items().await.into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["custom", "plain"]);
    }

    #[tokio::test]
    async fn test_reprices_drifted_entries() {
        let f = fixture(vec![ring()], 50.0);
        f.cart.collection().write(vec![entry("ring", Some(RING_ID), 1200.0)]).await.unwrap();
        let outcome = f.reconciler.reconcile(f.cart.collection()).await;
        assert_eq!(outcome.status(), Some(ReconcileStatus::Repriced));
        let items = f.cart.items().await;
        assert!((items[0].price - 1350.0).abs() < 1e-9);
        assert_eq!(items[0].original_price, Some(1500.0));
        assert_eq!(items[0].silver_weight_grams, Some(10.0));
    }

    #[tokio::test]
    async fn test_reports_both_changes() {
        let f = fixture(vec![ring()], 50.0);
        f.cart.collection().write(vec![entry("ring", Some(RING_ID), 1.0), entry("gone", Some(GONE_ID), 1.0)]).await.unwrap();
        let outcome = f.reconciler.reconcile(f.cart.collection()).await;
        assert!(matches!(outcome, ReconcileOutcome::Changed { status: ReconcileStatus::RemovedAndRepriced, removed: 1, repriced: 1, .. }));
    }

    #[tokio::test]
    async fn test_sub_tolerance_drift_is_ignored() {
        let f = fixture(vec![ring()], 50.0);
        let nearly = LineItem { price: 1350.00001, ..fresh_ring_entry() };
        f.cart.collection().write(vec![nearly]).await.unwrap();
        assert_eq!(f.reconciler.reconcile(f.cart.collection()).await, ReconcileOutcome::Unchanged);
        assert_eq!(f.cart.items().await[0].price, 1350.00001);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let f = fixture(vec![ring()], 50.0);
        f.cart.collection().write(vec![entry("ring", Some(RING_ID), 999.0), entry("gone", Some(GONE_ID), 1.0)]).await.unwrap();
        assert!(f.reconciler.reconcile(f.cart.collection()).await.status().is_some());
        let after_first = f.cart.items().await;
        assert_eq!(f.reconciler.reconcile(f.cart.collection()).await, ReconcileOutcome::Unchanged);
        assert_eq!(f.cart.items().await, after_first);
    }

    #[tokio::test]
    async fn test_catalog_failure_leaves_storage_alone() {
        let catalog = Arc::new(StaticCatalog::offline());
        let reconciler = Reconciler::new(RateCache::new(Arc::new(CountingRateSource::new(50.0))), catalog);
        let cart = Cart::new(Arc::new(MemoryStore::new()), CollectionEvents::default());
        cart.collection().write(vec![entry("gone", Some(GONE_ID), 1.0)]).await.unwrap();
        assert_eq!(reconciler.reconcile(cart.collection()).await, ReconcileOutcome::Abandoned);
        assert_eq!(cart.items().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_failure_leaves_storage_alone() {
        let catalog = Arc::new(StaticCatalog::new(vec![ring()]));
        let reconciler = Reconciler::new(RateCache::new(Arc::new(FailingRateSource)), catalog.clone());
        let cart = Cart::new(Arc::new(MemoryStore::new()), CollectionEvents::default());
        cart.collection().write(vec![fresh_ring_entry(), entry("gone", Some(GONE_ID), 1.0)]).await.unwrap();
        let before = cart.items().await;
        assert_eq!(reconciler.reconcile(cart.collection()).await, ReconcileOutcome::Abandoned);
        assert_eq!(cart.items().await, before);
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn test_keeps_entries_for_products_with_both_ids() {
        let page = json!({ "data": [{
            "_id": RING_ID, "id": RING_ID, "slug": "ring", "title": "Ring",
            "makingCost": 1000, "grams": 10, "discountPercent": 10
        }]});
        let f = fixture(decode_product_page(&page), 50.0);
        f.cart.collection().write(vec![fresh_ring_entry()]).await.unwrap();
        assert_eq!(f.reconciler.reconcile(f.cart.collection()).await, ReconcileOutcome::Unchanged);
        assert_eq!(f.cart.items().await.len(), 1);
    }

    #[tokio::test]
    async fn test_keeps_entries_for_products_with_malformed_fields() {
        let page = json!({ "data": [{
            "_id": RING_ID, "slug": "ring", "title": "Ring",
            "makingCost": 1000, "grams": 10, "discountPercent": 10,
            "variants": [null, 2], "attributes": ["Weight", 10]
        }]});
        let f = fixture(decode_product_page(&page), 50.0);
        f.cart.collection().write(vec![entry("ring", Some(RING_ID), 1200.0)]).await.unwrap();
        let outcome = f.reconciler.reconcile(f.cart.collection()).await;
        assert_eq!(outcome.status(), Some(ReconcileStatus::Repriced));
        let items = f.cart.items().await;
        assert_eq!(items.len(), 1);
        assert!((items[0].price - 1350.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_skips_fetch_without_catalog_entries() {
        let f = fixture(vec![ring()], 50.0);
        f.cart.collection().write(vec![entry("plain", None, 10.0)]).await.unwrap();
        assert_eq!(f.reconciler.reconcile(f.cart.collection()).await, ReconcileOutcome::NothingToCheck);
        assert_eq!(f.catalog.calls(), 0);
        assert_eq!(f.rates.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_is_refetched_every_pass() {
        let f = fixture(vec![ring()], 50.0);
        f.cart.collection().write(vec![fresh_ring_entry()]).await.unwrap();
        f.reconciler.reconcile(f.cart.collection()).await;
        f.rates.set_rate(60.0);
        let outcome = f.reconciler.reconcile(f.cart.collection()).await;
        assert_eq!(outcome.status(), Some(ReconcileStatus::Repriced));
        assert_eq!(f.rates.calls(), 2);
        assert_eq!(f.cart.items().await[0].original_price, Some(1600.0));
    }

    #[test]
    fn test_status_messages() {
        assert!(ReconcileStatus::Removed.message(CollectionKind::Wishlist).contains("wishlist"));
        assert!(ReconcileStatus::Repriced.message(CollectionKind::Cart).contains("Prices in your cart"));
        assert_ne!(
            ReconcileStatus::RemovedAndRepriced.message(CollectionKind::Cart),
            ReconcileStatus::Removed.message(CollectionKind::Cart)
        );
    }

    #[tokio::test]
    async fn test_watch_reconciles_on_mount_and_external_changes() {
        let f = fixture(vec![ring()], 50.0);
        let events = CollectionEvents::default();
        let wishlist = Wishlist::new(Arc::new(MemoryStore::new()), events);
        wishlist.collection().write(vec![entry("gone", Some(GONE_ID), 1.0)]).await.unwrap();

        let (handle, mut statuses) = f.reconciler.clone().spawn_watch(wishlist.collection().clone());
        assert_eq!(statuses.recv().await, Some(ReconcileStatus::Removed));

        wishlist.toggle(entry("ring", Some(RING_ID), 1.0)).await.unwrap();
        assert_eq!(statuses.recv().await, Some(ReconcileStatus::Repriced));

        drop(statuses);
        wishlist.clear().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
