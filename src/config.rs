//! Runtime configuration from the environment

use std::str::FromStr;
use std::time::Duration;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub nats_url: Option<String>,
    pub api_base_url: String,
    pub rate_path: String,
    /// JSON pointer to the price-per-gram inside the rate response.
    pub rate_field: String,
    pub catalog_path: String,
    pub catalog_page_size: u32,
    pub catalog_max_pages: u32,
    pub rate_max_age: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };
        Ok(Self {
            port: parsed(&lookup, "PORT", 8083)?,
            database_url: text("DATABASE_URL", "sqlite://silverline.db?mode=rwc"),
            nats_url: lookup("NATS_URL").filter(|v| !v.trim().is_empty()),
            api_base_url: text("API_BASE_URL", "http://localhost:5000"),
            rate_path: text("RATE_PATH", "/api/silver-rate"),
            rate_field: text("RATE_FIELD", "/data/pricePerGram"),
            catalog_path: text("CATALOG_PATH", "/api/products"),
            catalog_page_size: parsed(&lookup, "CATALOG_PAGE_SIZE", 200)?,
            catalog_max_pages: parsed(&lookup, "CATALOG_MAX_PAGES", 50)?,
            rate_max_age: Duration::from_secs(parsed(&lookup, "RATE_MAX_AGE_SECS", 300)?),
            http_timeout: Duration::from_secs(parsed(&lookup, "HTTP_TIMEOUT_SECS", 20)?),
        })
    }

    pub fn rate_url(&self) -> String { join_url(&self.api_base_url, &self.rate_path) }
    pub fn catalog_url(&self) -> String { join_url(&self.api_base_url, &self.catalog_path) }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| StorefrontError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") { return path.to_string(); }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
