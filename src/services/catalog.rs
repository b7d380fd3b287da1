//! Catalog access

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use crate::domain::aggregates::Product;

/// Read-only view of the live product catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_products(&self) -> crate::Result<Vec<Product>>;
}

/// Decodes one `{ "data": [...] }` catalog page. A missing `data` array is an
/// empty page; records that are not objects are skipped.
pub fn decode_product_page(body: &Value) -> Vec<Product> {
    let Some(records) = body.get("data").and_then(Value::as_array) else { return vec![] };
    records
        .iter()
        .filter_map(|record| {
            let product = Product::from_value(record);
            if product.is_none() { debug!(%record, "skipping malformed catalog record"); }
            product
        })
        .collect()
}
