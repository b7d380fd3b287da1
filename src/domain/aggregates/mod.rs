//! Aggregates module
pub mod product;
pub mod line_item;

pub use product::{Charge, Product, Variant};
pub use line_item::{CollectionKind, LineItem};
