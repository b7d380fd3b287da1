//! Silverline Storefront - pricing, cart and wishlist service

use anyhow::Result;
use silverline_storefront::api::{self, AppState};
use silverline_storefront::config::Config;
use silverline_storefront::domain::events::CollectionEvents;
use silverline_storefront::infrastructure::{http, nats, HttpCatalogSource, HttpRateSource};
use silverline_storefront::store::{Cart, SqliteStore, Wishlist};
use silverline_storefront::{LineItemCollection, RateCache, Reconciler};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let events = CollectionEvents::default();
    if let Some(url) = &config.nats_url {
        match async_nats::connect(url.as_str()).await {
            Ok(client) => { nats::spawn_relay(client, &events); }
            Err(err) => tracing::warn!(error = %err, "NATS unavailable, collection events stay in-process"),
        }
    }

    let client = http::client(config.http_timeout)?;
    let rates = RateCache::new(Arc::new(HttpRateSource::from_config(client.clone(), &config)));
    let catalog = Arc::new(HttpCatalogSource::from_config(client, &config));
    let reconciler = Arc::new(Reconciler::new(rates.clone(), catalog));

    let cart = Cart::new(store.clone(), events.clone());
    let wishlist = Wishlist::new(store, events);
    watch(&reconciler, cart.collection());
    watch(&reconciler, wishlist.collection());

    let state = AppState { cart, wishlist, rates, reconciler, rate_max_age: config.rate_max_age };
    let app = api::router(state);

    tracing::info!("Silverline storefront listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

fn watch(reconciler: &Arc<Reconciler>, collection: &LineItemCollection) {
    let kind = collection.kind();
    let (_, mut statuses) = Arc::clone(reconciler).spawn_watch(collection.clone());
    tokio::spawn(async move {
        while let Some(status) = statuses.recv().await {
            tracing::info!(collection = kind.label(), ?status, "{}", status.message(kind));
        }
    });
}
