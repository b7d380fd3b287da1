//! HTTP surface over the pricing core, cart and wishlist

use axum::{extract::{Path, State}, http::StatusCode, routing::{delete, get, post, put}, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;
use crate::domain::aggregates::{CollectionKind, LineItem, Product};
use crate::services::pricing::Quote;
use crate::services::rates::RateCache;
use crate::services::reconcile::{ReconcileOutcome, ReconcileStatus, Reconciler};
use crate::store::{Cart, LineItemCollection, Wishlist};
use crate::StorefrontError;

#[derive(Clone)]
pub struct AppState {
    pub cart: Cart,
    pub wishlist: Wishlist,
    pub rates: RateCache,
    pub reconciler: Arc<Reconciler>,
    pub rate_max_age: Duration,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn error_response(err: StorefrontError) -> (StatusCode, String) {
    match err {
        StorefrontError::ItemNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "silverline-storefront"})) }))
        .route("/api/v1/rate", get(get_rate))
        .route("/api/v1/pricing/quote", post(quote))
        .route("/api/v1/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/api/v1/cart/products", post(add_product_to_cart))
        .route("/api/v1/cart/reconcile", post(reconcile_cart))
        .route("/api/v1/cart/:key", put(update_cart_qty).delete(remove_from_cart))
        .route("/api/v1/wishlist", get(get_wishlist).delete(clear_wishlist))
        .route("/api/v1/wishlist/toggle", post(toggle_wishlist))
        .route("/api/v1/wishlist/reconcile", post(reconcile_wishlist))
        .route("/api/v1/wishlist/:key", delete(remove_from_wishlist))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    #[validate(length(min = 1))] pub key: String,
    #[validate(length(min = 1))] pub title: String,
    #[serde(default)] pub id: Option<String>,
    #[serde(default)] pub sku: Option<String>,
    #[serde(default)] pub price: f64,
    #[serde(default)] pub original_price: Option<f64>,
    #[serde(default)] pub silver_weight_grams: Option<f64>,
    #[serde(default)] pub images: Vec<String>,
    #[serde(default)] pub image_url: Option<String>,
    #[serde(default = "one")] pub qty: u32,
}

fn one() -> u32 { 1 }

impl From<LineItemRequest> for LineItem {
    fn from(r: LineItemRequest) -> Self {
        LineItem {
            key: r.key, id: r.id, sku: r.sku, title: r.title, price: r.price, original_price: r.original_price,
            silver_weight_grams: r.silver_weight_grams, images: r.images, image_url: r.image_url, qty: r.qty,
        }
    }
}

fn validated(r: LineItemRequest) -> ApiResult<LineItem> {
    r.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    Ok(r.into())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub product: Product,
    #[serde(default)] pub qty: Option<u32>,
    #[serde(default)] pub rate_per_gram: Option<f64>,
}

#[derive(Debug, Deserialize)] pub struct QtyRequest { pub qty: f64 }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView { pub items: Vec<LineItem>, pub item_count: u64, pub subtotal: f64 }

impl From<Vec<LineItem>> for CartView {
    fn from(items: Vec<LineItem>) -> Self {
        let item_count = items.iter().map(|i| u64::from(i.qty)).sum();
        let subtotal = items.iter().map(LineItem::line_total).sum();
        Self { items, item_count, subtotal }
    }
}

#[derive(Debug, Serialize)] pub struct WishlistView { pub items: Vec<LineItem> }
#[derive(Debug, Serialize)] #[serde(rename_all = "camelCase")] pub struct ToggleView { pub in_wishlist: bool, pub items: Vec<LineItem> }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileView {
    pub outcome: &'static str,
    pub status: Option<ReconcileStatus>,
    pub message: Option<String>,
    pub removed: usize,
    pub repriced: usize,
}

impl ReconcileView {
    fn new(outcome: ReconcileOutcome, kind: CollectionKind) -> Self {
        let (label, removed, repriced) = match &outcome {
            ReconcileOutcome::NothingToCheck => ("nothing_to_check", 0, 0),
            ReconcileOutcome::Abandoned => ("abandoned", 0, 0),
            ReconcileOutcome::Unchanged => ("unchanged", 0, 0),
            ReconcileOutcome::Changed { removed, repriced, .. } => ("changed", *removed, *repriced),
        };
        let status = outcome.status();
        Self { outcome: label, status, message: status.map(|s| s.message(kind)), removed, repriced }
    }
}

async fn get_rate(State(s): State<AppState>) -> Json<serde_json::Value> {
    let rate = s.rates.rate_per_gram(s.rate_max_age).await;
    Json(serde_json::json!({ "ratePerGram": rate, "maxAgeSecs": s.rate_max_age.as_secs() }))
}

async fn quote(State(s): State<AppState>, Json(r): Json<ProductRequest>) -> Json<Quote> {
    let rate = match r.rate_per_gram {
        Some(rate) => rate,
        None => s.rates.rate_per_gram(s.rate_max_age).await,
    };
    Json(Quote::for_product(&r.product, rate))
}

async fn get_cart(State(s): State<AppState>) -> Json<CartView> { Json(s.cart.items().await.into()) }

async fn add_to_cart(State(s): State<AppState>, Json(r): Json<LineItemRequest>) -> ApiResult<(StatusCode, Json<CartView>)> {
    let items = s.cart.add(validated(r)?).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(items.into())))
}

async fn add_product_to_cart(State(s): State<AppState>, Json(r): Json<ProductRequest>) -> ApiResult<(StatusCode, Json<CartView>)> {
    let rate = s.rates.rate_per_gram(s.rate_max_age).await;
    let pricing = Quote::for_product(&r.product, rate).pricing;
    let item = LineItem::from_product(&r.product, &pricing, r.qty.unwrap_or(1))
        .ok_or((StatusCode::UNPROCESSABLE_ENTITY, "product has no slug, sku or title".to_string()))?;
    let items = s.cart.add(item).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(items.into())))
}

async fn update_cart_qty(State(s): State<AppState>, Path(key): Path<String>, Json(r): Json<QtyRequest>) -> ApiResult<Json<CartView>> {
    if !s.cart.items().await.iter().any(|i| i.key == key) {
        return Err(error_response(StorefrontError::ItemNotFound));
    }
    let items = s.cart.update_qty(&key, r.qty).await.map_err(error_response)?;
    Ok(Json(items.into()))
}

async fn remove_from_cart(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.cart.remove(&key).await.map_err(error_response)?.into()))
}

async fn clear_cart(State(s): State<AppState>) -> ApiResult<StatusCode> {
    s.cart.clear().await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_wishlist(State(s): State<AppState>) -> Json<WishlistView> { Json(WishlistView { items: s.wishlist.items().await }) }

async fn toggle_wishlist(State(s): State<AppState>, Json(r): Json<LineItemRequest>) -> ApiResult<Json<ToggleView>> {
    let in_wishlist = s.wishlist.toggle(validated(r)?).await.map_err(error_response)?;
    Ok(Json(ToggleView { in_wishlist, items: s.wishlist.items().await }))
}

async fn remove_from_wishlist(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<WishlistView>> {
    Ok(Json(WishlistView { items: s.wishlist.remove(&key).await.map_err(error_response)? }))
}

async fn clear_wishlist(State(s): State<AppState>) -> ApiResult<StatusCode> {
    s.wishlist.clear().await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reconcile(s: &AppState, collection: &LineItemCollection) -> Json<ReconcileView> {
    let outcome = s.reconciler.reconcile(collection).await;
    Json(ReconcileView::new(outcome, collection.kind()))
}

async fn reconcile_cart(State(s): State<AppState>) -> Json<ReconcileView> { reconcile(&s, s.cart.collection()).await }
async fn reconcile_wishlist(State(s): State<AppState>) -> Json<ReconcileView> { reconcile(&s, s.wishlist.collection()).await }

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use crate::domain::events::CollectionEvents;
    use crate::store::MemoryStore;
    use crate::testing::{CountingRateSource, StaticCatalog};

    const RING_ID: &str = "64b7f0c2a1b2c3d4e5f60718";

    fn app() -> Router {
        let store = Arc::new(MemoryStore::new());
        let events = CollectionEvents::default();
        let rates = RateCache::new(Arc::new(CountingRateSource::new(50.0)));
        let ring: Product = serde_json::from_value(json!({
            "_id": RING_ID, "slug": "ring", "title": "Ring", "makingCost": 1000, "grams": 10, "discountPercent": 10
        })).unwrap();
        let reconciler = Arc::new(Reconciler::new(rates.clone(), Arc::new(StaticCatalog::new(vec![ring]))));
        router(AppState {
            cart: Cart::new(store.clone(), events.clone()),
            wishlist: Wishlist::new(store, events),
            rates,
            reconciler,
            rate_max_age: Duration::from_secs(300),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }.unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_and_rate() {
        let app = app();
        assert_eq!(send(&app, "GET", "/health", None).await.0, StatusCode::OK);
        let (status, body) = send(&app, "GET", "/api/v1/rate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ratePerGram"], json!(50.0));
    }

    #[tokio::test]
    async fn test_quote_uses_explicit_rate() {
        let app = app();
        let product = json!({ "makingCost": 1000, "grams": 10, "discountPercent": 10 });
        let (_, body) = send(&app, "POST", "/api/v1/pricing/quote", Some(json!({ "product": product, "ratePerGram": 0 }))).await;
        assert_eq!(body["price"], json!(900.0));
        assert_eq!(body["originalPrice"], json!(1000.0));
    }

    #[tokio::test]
    async fn test_cart_flow() {
        let app = app();
        let item = json!({ "key": "chain", "title": "Chain", "price": 500, "qty": 2 });
        let (status, body) = send(&app, "POST", "/api/v1/cart", Some(item.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["itemCount"], json!(2));
        send(&app, "POST", "/api/v1/cart", Some(item)).await;
        let (_, body) = send(&app, "PUT", "/api/v1/cart/chain", Some(json!({ "qty": 0 }))).await;
        assert_eq!(body["items"][0]["qty"], json!(1));
        assert_eq!(send(&app, "PUT", "/api/v1/cart/missing", Some(json!({ "qty": 3 }))).await.0, StatusCode::NOT_FOUND);
        let (_, body) = send(&app, "DELETE", "/api/v1/cart/chain", None).await;
        assert_eq!(body["items"], json!([]));
        assert_eq!(send(&app, "DELETE", "/api/v1/cart", None).await.0, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_rejects_item_without_title() {
        let app = app();
        let (status, _) = send(&app, "POST", "/api/v1/cart", Some(json!({ "key": "x", "title": "" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_zero_qty_is_clamped_not_rejected() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/v1/cart", Some(json!({ "key": "anklet", "title": "Anklet", "qty": 0 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["items"][0]["qty"], json!(1));
        assert_eq!(body["itemCount"], json!(1));
    }

    #[tokio::test]
    async fn test_add_product_prices_with_rate() {
        let app = app();
        let product = json!({ "_id": RING_ID, "slug": "ring", "title": "Ring", "makingCost": 1000, "grams": 10, "discountPercent": 10 });
        let (status, body) = send(&app, "POST", "/api/v1/cart/products", Some(json!({ "product": product }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["items"][0]["key"], json!("ring"));
        assert_eq!(body["items"][0]["originalPrice"], json!(1500.0));
    }

    #[tokio::test]
    async fn test_wishlist_toggle_and_reconcile() {
        let app = app();
        let stale = json!({ "key": "ring", "title": "Ring", "id": RING_ID, "price": 10 });
        let (_, body) = send(&app, "POST", "/api/v1/wishlist/toggle", Some(stale)).await;
        assert_eq!(body["inWishlist"], json!(true));
        let (_, body) = send(&app, "POST", "/api/v1/wishlist/reconcile", None).await;
        assert_eq!(body["outcome"], json!("changed"));
        assert_eq!(body["status"], json!("repriced"));
        assert!(body["message"].as_str().unwrap().contains("wishlist"));
        let (_, body) = send(&app, "POST", "/api/v1/wishlist/reconcile", None).await;
        assert_eq!(body["outcome"], json!("unchanged"));
        assert_eq!(body["message"], Value::Null);
    }
}
