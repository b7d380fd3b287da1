//! Value Objects for the storefront core

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Catalog product identifier: exactly 24 lowercase hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CatalogId(String);

impl CatalogId {
    pub const LEN: usize = 24;

    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == Self::LEN
            && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Line item quantity, always an integer >= 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    /// Truncates toward zero and clamps into `1..=u32::MAX`. Non-finite input becomes 1.
    pub fn clamped(raw: f64) -> Self {
        if !raw.is_finite() || raw < 1.0 { return Self::ONE; }
        Self(raw.trunc().min(u32::MAX as f64) as u32)
    }

    pub fn new(value: u32) -> Self { Self(value.max(1)) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
}

impl Default for Quantity { fn default() -> Self { Self::ONE } }

/// Coerces a loosely typed JSON scalar into a finite number.
///
/// Numbers and numeric strings are accepted; everything else, and any
/// non-finite result, is `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Coerces a JSON string or number into a trimmed, non-empty string.
pub fn coerce_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Accepts either a bare string or an array and keeps the non-empty strings.
pub fn coerce_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.iter().filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }).collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => vec![],
    }
}
