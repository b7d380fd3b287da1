//! Persistence for the cart and wishlist
//!
//! Collections are stored as JSON blobs behind a minimal key-value port so
//! the normalize-on-write rules do not depend on where bytes end up.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use crate::{Result, StorefrontError};

pub mod collection;
pub mod sqlite;

pub use collection::{Cart, LineItemCollection, Wishlist};
pub use sqlite::SqliteStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|e| StorefrontError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.write().map_err(|e| StorefrontError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}
