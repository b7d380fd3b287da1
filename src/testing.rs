//! Test doubles for the rate and catalog sources

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;
use crate::domain::aggregates::Product;
use crate::services::catalog::CatalogSource;
use crate::services::rates::RateSource;
use crate::{Result, StorefrontError};

pub struct CountingRateSource {
    rate: Mutex<f64>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl CountingRateSource {
    pub fn new(rate: f64) -> Self { Self { rate: Mutex::new(rate), calls: AtomicUsize::new(0), gate: None } }

    /// Fetches block until `release` is called.
    pub fn gated(rate: f64) -> Self { Self { gate: Some(Semaphore::new(0)), ..Self::new(rate) } }

    pub fn release(&self) {
        if let Some(gate) = &self.gate { gate.add_permits(Semaphore::MAX_PERMITS / 2); }
    }

    pub fn set_rate(&self, rate: f64) { *self.rate.lock().unwrap() = rate; }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl RateSource for CountingRateSource {
    async fn fetch_rate_per_gram(&self) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| StorefrontError::Storage(e.to_string()))?;
        }
        Ok(*self.rate.lock().unwrap())
    }
}

pub struct FailingRateSource;

#[async_trait]
impl RateSource for FailingRateSource {
    async fn fetch_rate_per_gram(&self) -> Result<f64> {
        Err(StorefrontError::Config("rate source offline".into()))
    }
}

/// Serves a fixed product list, or fails when `offline`.
pub struct StaticCatalog {
    products: Mutex<Vec<Product>>,
    offline: bool,
    calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products: Mutex::new(products), offline: false, calls: AtomicUsize::new(0) }
    }

    pub fn offline() -> Self { Self { offline: true, ..Self::new(vec![]) } }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_products(&self) -> Result<Vec<Product>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline { return Err(StorefrontError::Storage("catalog offline".into())); }
        Ok(self.products.lock().unwrap().clone())
    }
}
