//! Adapters to the outside world: upstream HTTP APIs and NATS
pub mod http;
pub mod nats;

pub use http::{HttpCatalogSource, HttpRateSource};
