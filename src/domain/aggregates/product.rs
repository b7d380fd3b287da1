//! Product Aggregate
//!
//! Catalog records as served by the storefront API. Every numeric field is
//! optional and tolerant of strings, nulls and garbage; resolution of the
//! legacy product/variant/attribute fallbacks lives in `services::pricing`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use crate::domain::value_objects::{coerce_number, coerce_string, coerce_strings, CatalogId};

/// A cost component stored either as a bare number or as `{ "amount": n }`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Charge(f64);

impl Charge {
    pub fn new(amount: f64) -> Self { Self(amount) }

    pub fn from_value(value: &Value) -> Self {
        let raw = match value {
            Value::Object(obj) => obj.get("amount").and_then(coerce_number),
            other => coerce_number(other),
        };
        Self(raw.unwrap_or(0.0))
    }

    /// Finite amount, 0 otherwise.
    pub fn amount(self) -> f64 { if self.0.is_finite() { self.0 } else { 0.0 } }
}

impl<'de> Deserialize<'de> for Charge {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(&Value::deserialize(d)?))
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub sku: Option<String>,
    pub variants: Vec<Variant>,
    pub attributes: Map<String, Value>,
    pub grams: Option<f64>,
    pub silver_weight_grams: Option<f64>,
    pub making_cost: Option<Charge>,
    pub other_charges: Option<Charge>,
    pub discount_percent: Option<f64>,
    pub images: Vec<String>,
    pub image: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub is_active: bool,
    pub sku: Option<String>,
    pub grams: Option<f64>,
    pub silver_weight_grams: Option<f64>,
    pub making_cost: Option<Charge>,
    pub other_charges: Option<Charge>,
    pub discount_percent: Option<f64>,
    pub stock: u32,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub video: Option<String>,
}

impl Default for Variant {
    fn default() -> Self {
        Self {
            is_active: true, sku: None, grams: None, silver_weight_grams: None,
            making_cost: None, other_charges: None, discount_percent: None,
            stock: 0, image: None, images: vec![], video: None,
        }
    }
}

static NULL: Value = Value::Null;

fn charge(value: &Value) -> Option<Charge> {
    (!value.is_null()).then(|| Charge::from_value(value))
}

fn stock_level(value: &Value) -> u32 {
    let raw = coerce_number(value).unwrap_or(0.0);
    if raw <= 0.0 { 0 } else { raw.trunc().min(u32::MAX as f64) as u32 }
}

impl Variant {
    /// Lenient decode; `None` only when the value is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| obj.get(name).unwrap_or(&NULL);
        Some(Self {
            // Only an explicit `false` deactivates a variant.
            is_active: !matches!(field("isActive"), Value::Bool(false)),
            sku: coerce_string(field("sku")),
            grams: coerce_number(field("grams")),
            silver_weight_grams: coerce_number(field("silverWeightGrams")),
            making_cost: charge(field("makingCost")),
            other_charges: charge(field("otherCharges")),
            discount_percent: coerce_number(field("discountPercent")),
            stock: stock_level(field("stock")),
            image: coerce_string(field("image")),
            images: coerce_strings(field("images")),
            video: coerce_string(field("video")),
        })
    }
}

impl Product {
    /// Lenient decode of a catalog record; `None` only when the value is not an object.
    ///
    /// `_id` wins over `id` and `title` over `name`. Variants that are not
    /// objects are skipped and a non-object `attributes` reads as empty, so a
    /// record never disappears because one nested field is malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| obj.get(name).unwrap_or(&NULL);
        Some(Self {
            id: coerce_string(field("_id")).or_else(|| coerce_string(field("id"))),
            slug: coerce_string(field("slug")),
            title: coerce_string(field("title")).or_else(|| coerce_string(field("name"))),
            sku: coerce_string(field("sku")),
            variants: field("variants")
                .as_array()
                .map(|variants| variants.iter().filter_map(Variant::from_value).collect())
                .unwrap_or_default(),
            attributes: field("attributes").as_object().cloned().unwrap_or_default(),
            grams: coerce_number(field("grams")),
            silver_weight_grams: coerce_number(field("silverWeightGrams")),
            making_cost: charge(field("makingCost")),
            other_charges: charge(field("otherCharges")),
            discount_percent: coerce_number(field("discountPercent")),
            images: coerce_strings(field("images")),
            image: coerce_string(field("image")),
        })
    }
}

impl<'de> Deserialize<'de> for Product {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Self::from_value(&Value::deserialize(d)?).ok_or_else(|| D::Error::custom("product record is not an object"))
    }
}

impl<'de> Deserialize<'de> for Variant {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Self::from_value(&Value::deserialize(d)?).ok_or_else(|| D::Error::custom("variant is not an object"))
    }
}

impl Product {
    /// First active variant, else the first variant, else none.
    pub fn primary_variant(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_active).or_else(|| self.variants.first())
    }

    pub fn catalog_id(&self) -> Option<CatalogId> { self.id.as_deref().and_then(CatalogId::parse) }

    /// Identity key used by the cart and wishlist: slug, then sku, then title.
    pub fn line_item_key(&self) -> Option<String> {
        let variant_sku = self.primary_variant().and_then(|v| v.sku.clone());
        [self.slug.clone(), self.sku.clone(), variant_sku, self.title.clone()]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    }

    /// Gallery for display: primary variant images, then product images, then single image fields.
    pub fn display_images(&self) -> Vec<String> {
        let variant = self.primary_variant();
        if let Some(v) = variant.filter(|v| !v.images.is_empty()) { return v.images.clone(); }
        if !self.images.is_empty() { return self.images.clone(); }
        variant.and_then(|v| v.image.clone()).or_else(|| self.image.clone()).into_iter().collect()
    }
}
