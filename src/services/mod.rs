//! Pricing, rate caching, catalog access and reconciliation
pub mod catalog;
pub mod pricing;
pub mod rates;
pub mod reconcile;
