//! Pricing engine
//!
//! Pure, total functions turning a catalog product and a silver rate into a
//! sale price. Malformed or missing inputs degrade to 0, never to an error.
//!
//! Lookups fall back in a fixed order: product fields, then the primary
//! variant, then named `attributes` entries, stopping at the first positive,
//! finite value.

use serde::Serialize;
use serde_json::{Map, Value};
use crate::domain::aggregates::{Charge, Product, Variant};
use crate::domain::value_objects::coerce_number;

pub const SILVER_WEIGHT_KEYS: [&str; 6] =
    ["silverWeightGrams", "silver_weight_grams", "grams", "gram", "weight", "weightGrams"];

pub const DISCOUNT_KEYS: [&str; 2] = ["discountPercent", "discount_percent"];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub price: f64,
    /// Present only when a discount actually lowered the price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub discount_percent: f64,
}

impl Pricing {
    pub fn is_discounted(&self) -> bool { self.original_price.is_some() }
}

fn positive(value: Option<f64>) -> Option<f64> { value.filter(|n| n.is_finite() && *n > 0.0) }

fn finite_or_zero(value: f64) -> f64 { if value.is_finite() { value } else { 0.0 } }

fn first_positive_attribute(attributes: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().map(|key| attribute_number(attributes, key)).find(|n| *n > 0.0)
}

pub fn primary_variant(product: &Product) -> Option<&Variant> { product.primary_variant() }

/// Case-insensitive attribute lookup. Non-positive or non-numeric values count as absent (0).
pub fn attribute_number(attributes: &Map<String, Value>, key: &str) -> f64 {
    attributes
        .get(key)
        .or_else(|| attributes.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
        .and_then(coerce_number)
        .filter(|n| *n > 0.0)
        .unwrap_or(0.0)
}

pub fn silver_weight_grams(product: &Product) -> f64 {
    let variant = primary_variant(product);
    positive(product.silver_weight_grams)
        .or_else(|| positive(product.grams))
        .or_else(|| variant.and_then(|v| positive(v.silver_weight_grams)))
        .or_else(|| variant.and_then(|v| positive(v.grams)))
        .or_else(|| first_positive_attribute(&product.attributes, &SILVER_WEIGHT_KEYS))
        .unwrap_or(0.0)
}

fn charges(making: Option<Charge>, other: Option<Charge>) -> f64 {
    finite_or_zero(making.map_or(0.0, Charge::amount) + other.map_or(0.0, Charge::amount))
}

/// Making cost plus other charges, product level first, primary variant otherwise.
pub fn base_price(product: &Product) -> f64 {
    let own = charges(product.making_cost, product.other_charges);
    if own > 0.0 { return own; }
    primary_variant(product).map_or(0.0, |v| charges(v.making_cost, v.other_charges))
}

/// Variant discount first, then product, then attributes; clamped to `[0, 100]`.
pub fn discount_percent(product: &Product) -> f64 {
    primary_variant(product)
        .and_then(|v| positive(v.discount_percent))
        .or_else(|| positive(product.discount_percent))
        .or_else(|| first_positive_attribute(&product.attributes, &DISCOUNT_KEYS))
        .map_or(0.0, |d| d.clamp(0.0, 100.0))
}

/// A rate that is zero, negative or NaN contributes no silver add-on.
pub fn compute_pricing(product: &Product, rate_per_gram: f64) -> Pricing {
    let silver = if rate_per_gram > 0.0 { silver_weight_grams(product) * rate_per_gram } else { 0.0 };
    let original = finite_or_zero(base_price(product) + silver);
    let discount = discount_percent(product);
    let price = finite_or_zero(if discount > 0.0 { original * (1.0 - discount / 100.0) } else { original });
    let original_price = (discount > 0.0 && original > price).then_some(original);
    Pricing { price, original_price, discount_percent: discount }
}

pub fn compute_total_price(product: &Product, rate_per_gram: f64) -> f64 {
    compute_pricing(product, rate_per_gram).price
}

/// Pricing breakdown handed to display surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(flatten)]
    pub pricing: Pricing,
    pub base_price: f64,
    pub silver_weight_grams: f64,
    pub rate_per_gram: f64,
}

impl Quote {
    pub fn for_product(product: &Product, rate_per_gram: f64) -> Self {
        Self {
            pricing: compute_pricing(product, rate_per_gram),
            base_price: base_price(product),
            silver_weight_grams: silver_weight_grams(product),
            rate_per_gram: finite_or_zero(rate_per_gram),
        }
    }
}
