//! Silverline Storefront Core
//!
//! Pricing and client-local state for a silver jewellery storefront.
//!
//! ## Features
//! - Silver-rate driven price computation
//! - Single-flight, time-boxed silver rate cache
//! - Persisted cart and wishlist collections with normalize-on-write
//! - Background reconciliation against the live catalog

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::aggregates::{CollectionKind, LineItem, Product, Variant};
pub use services::pricing::{compute_pricing, compute_total_price, Pricing};
pub use services::rates::RateCache;
pub use services::reconcile::{ReconcileOutcome, ReconcileStatus, Reconciler};
pub use store::{Cart, KeyValueStore, LineItemCollection, Wishlist};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Item not found")]
    ItemNotFound,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
