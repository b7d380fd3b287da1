//! HTTP-backed rate and catalog sources

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use crate::config::Config;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::coerce_number;
use crate::services::catalog::{decode_product_page, CatalogSource};
use crate::services::rates::RateSource;
use crate::Result;

pub fn client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Reads the price-per-gram at a JSON pointer; anything unusable is 0.
pub fn extract_rate(body: &Value, pointer: &str) -> f64 {
    body.pointer(pointer).and_then(coerce_number).unwrap_or(0.0)
}

#[derive(Clone)]
pub struct HttpRateSource {
    http: Client,
    url: String,
    field: String,
}

impl HttpRateSource {
    pub fn new(http: Client, url: impl Into<String>, field: impl Into<String>) -> Self {
        Self { http, url: url.into(), field: field.into() }
    }

    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(http, config.rate_url(), config.rate_field.clone())
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate_per_gram(&self) -> Result<f64> {
        let body: Value = self.http.get(&self.url).send().await?.error_for_status()?.json().await?;
        Ok(extract_rate(&body, &self.field))
    }
}

#[derive(Clone)]
pub struct HttpCatalogSource {
    http: Client,
    url: String,
    page_size: u32,
    max_pages: u32,
}

impl HttpCatalogSource {
    pub fn new(http: Client, url: impl Into<String>, page_size: u32, max_pages: u32) -> Self {
        Self { http, url: url.into(), page_size: page_size.max(1), max_pages: max_pages.max(1) }
    }

    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(http, config.catalog_url(), config.catalog_page_size, config.catalog_max_pages)
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Product>> {
        let body: Value = self.http
            .get(&self.url)
            .query(&[("page", page), ("limit", self.page_size)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(decode_product_page(&body))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_products(&self) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        let mut seen = HashSet::new();
        for page in 1..=self.max_pages {
            let batch = self.fetch_page(page).await?;
            let fetched = batch.len();
            let before = seen.len();
            for product in batch {
                let fresh = product.id.clone().map_or(true, |id| seen.insert(id));
                if fresh { products.push(product); }
            }
            // Servers that ignore `page` keep returning the same records.
            if fetched < self.page_size as usize || seen.len() == before { break; }
        }
        debug!(count = products.len(), "catalog fetched");
        Ok(products)
    }
}
