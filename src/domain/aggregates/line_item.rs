//! Line Item Aggregate
//!
//! A single cart or wishlist entry at a remembered price. Entries are
//! normalized every time a collection is persisted; anything without a
//! `key` and a `title` never reaches storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{coerce_number, coerce_string, coerce_strings, CatalogId, Quantity};
use crate::services::pricing::{silver_weight_grams, Pricing};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind { Cart, Wishlist }

impl CollectionKind {
    pub fn storage_key(self) -> &'static str {
        match self { Self::Cart => "silverline.cart.v1", Self::Wishlist => "silverline.wishlist.v1" }
    }

    pub fn event_name(self) -> &'static str {
        match self { Self::Cart => "cart:updated", Self::Wishlist => "wishlist:updated" }
    }

    pub fn label(self) -> &'static str {
        match self { Self::Cart => "cart", Self::Wishlist => "wishlist" }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub title: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silver_weight_grams: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default = "one")]
    pub qty: u32,
}

fn one() -> u32 { 1 }

static NULL: Value = Value::Null;

impl LineItem {
    pub fn new(key: impl Into<String>, title: impl Into<String>, price: f64) -> Self {
        Self {
            key: key.into(), id: None, sku: None, title: title.into(), price,
            original_price: None, silver_weight_grams: None, images: vec![], image_url: None, qty: 1,
        }
    }

    /// Snapshot of a priced catalog product. `None` when no identity key can be derived.
    pub fn from_product(product: &Product, pricing: &Pricing, qty: u32) -> Option<Self> {
        let key = product.line_item_key()?;
        let title = product.title.clone().unwrap_or_else(|| key.clone());
        let weight = silver_weight_grams(product);
        let images = product.display_images();
        let sku = product.sku.clone().or_else(|| product.primary_variant().and_then(|v| v.sku.clone()));
        Self {
            key, id: product.id.clone(), sku, title,
            price: pricing.price,
            original_price: pricing.original_price,
            silver_weight_grams: (weight > 0.0).then_some(weight),
            image_url: images.first().cloned(),
            images,
            qty: Quantity::new(qty).value(),
        }
        .normalized()
    }

    /// Lenient decode of a persisted entry; type coercion happens here, validity in `normalized`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| obj.get(name).unwrap_or(&NULL);
        Self {
            key: coerce_string(field("key")).unwrap_or_default(),
            id: coerce_string(field("id")),
            sku: coerce_string(field("sku")),
            title: coerce_string(field("title")).unwrap_or_default(),
            price: coerce_number(field("price")).unwrap_or(0.0),
            original_price: coerce_number(field("originalPrice")),
            silver_weight_grams: coerce_number(field("silverWeightGrams")),
            images: coerce_strings(field("images")),
            image_url: coerce_string(field("imageUrl")),
            qty: coerce_number(field("qty")).map_or(Quantity::ONE, Quantity::clamped).value(),
        }
        .normalized()
    }

    /// Enforces the persisted invariants, or drops the entry.
    pub fn normalized(mut self) -> Option<Self> {
        self.key = self.key.trim().to_string();
        self.title = self.title.trim().to_string();
        if self.key.is_empty() || self.title.is_empty() { return None; }
        if !self.price.is_finite() { self.price = 0.0; }
        self.original_price = self.original_price.filter(|p| p.is_finite());
        self.silver_weight_grams = self.silver_weight_grams.filter(|g| g.is_finite() && *g > 0.0);
        self.images = self.images.into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        self.image_url = self.image_url.map(|url| url.trim().to_string()).filter(|url| !url.is_empty());
        self.id = self.id.filter(|id| !id.trim().is_empty());
        self.sku = self.sku.filter(|sku| !sku.trim().is_empty());
        self.qty = Quantity::new(self.qty).value();
        Some(self)
    }

    pub fn catalog_id(&self) -> Option<CatalogId> { self.id.as_deref().and_then(CatalogId::parse) }

    pub fn line_total(&self) -> f64 { self.price * f64::from(self.qty) }

    /// Merges a re-added entry in place: incoming fields win when present and quantities add up.
    pub fn merge(&mut self, incoming: LineItem) {
        self.qty = Quantity::new(self.qty).add(incoming.qty).value();
        self.id = incoming.id.or(self.id.take());
        self.sku = incoming.sku.or(self.sku.take());
        self.original_price = incoming.original_price;
        self.silver_weight_grams = incoming.silver_weight_grams.or(self.silver_weight_grams);
        if !incoming.images.is_empty() { self.images = incoming.images; }
        self.image_url = incoming.image_url.or(self.image_url.take());
        self.key = incoming.key;
        self.title = incoming.title;
        self.price = incoming.price;
    }
}
