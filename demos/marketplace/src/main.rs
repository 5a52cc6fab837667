//! Marketplace demo - persisted cart lifecycle walkthrough
//!
//! Runs a cart over file-backed storage through three simulated app
//! sessions: shopping, a restart that restores the cart, and the
//! clear-then-restart sequence that shows why clearing alone is not
//! durable.
//!
//! # Running the Demo
//!
//! ```bash
//! cargo run -p marketplace [DATA_DIR]
//! ```
//!
//! State persists under `DATA_DIR` (default: `trolley-marketplace` in the
//! system temp directory), so running the demo twice shows quantities
//! carried over from the previous run.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trolley_cart::{CartEnvironment, CartHandle, ProductId, ProductInfo};
use trolley_runtime::metrics::MetricsServer;
use trolley_runtime::{RetryPolicy, StoreConfig};
use trolley_storage_fs::FileKv;

fn shirt() -> ProductInfo {
    ProductInfo {
        id: ProductId::new("1"),
        title: "Cotton T-Shirt".to_string(),
        image_url: "https://marketplace.example/images/shirt.png".to_string(),
        price: 49.9,
    }
}

fn mug() -> ProductInfo {
    ProductInfo {
        id: ProductId::new("2"),
        title: "Enamel Mug".to_string(),
        image_url: "https://marketplace.example/images/mug.png".to_string(),
        price: 19.5,
    }
}

fn tote() -> ProductInfo {
    ProductInfo {
        id: ProductId::new("3"),
        title: "Canvas Tote Bag".to_string(),
        image_url: "https://marketplace.example/images/tote.png".to_string(),
        price: 29.0,
    }
}

async fn log_cart(cart: &CartHandle) {
    for product in cart.products().await {
        tracing::info!(
            id = %product.id,
            title = %product.title,
            quantity = product.quantity,
            price = product.price,
            "In cart"
        );
    }

    let items = cart.total_items().await;
    let subtotal = cart.subtotal().await;
    tracing::info!(items, subtotal, "Cart totals");
}

fn open_cart(data_dir: &Path) -> CartHandle {
    let config = StoreConfig::default()
        .with_retry_policy(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(100)),
        )
        .with_shutdown_timeout(Duration::from_secs(10));

    CartHandle::with_config(
        CartEnvironment::new(Arc::new(FileKv::new(data_dir))),
        config,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,trolley_cart=debug,trolley_runtime=debug,marketplace=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Marketplace demo");

    // 2. Durable storage directory; rerun the demo to see it restored
    let data_dir = std::env::args().nth(1).map_or_else(
        || std::env::temp_dir().join("trolley-marketplace"),
        PathBuf::from,
    );
    tracing::info!(dir = %data_dir.display(), "Cart persists under");

    // 3. Install the metrics recorder
    let mut metrics = MetricsServer::new("127.0.0.1:9090".parse()?);
    metrics.start()?;

    // ── Session 1: shopping ────────────────────────────────────────────

    let cart = open_cart(&data_dir);

    // 4. Hydrate: restores whatever the previous run persisted
    cart.hydrate().await?;
    let restored = cart.products().await;
    if restored.is_empty() {
        tracing::info!("First run: cart starts empty");
    } else {
        tracing::info!(
            products = restored.len(),
            "Restored the cart from a previous run"
        );
    }

    // 5. Shop: each operation updates memory and queues one write
    cart.add_to_cart(shirt()).await?;
    cart.add_to_cart(mug()).await?;
    cart.add_to_cart(tote()).await?;

    // Adding the shirt again bumps its quantity instead of duplicating it
    cart.add_to_cart(shirt()).await?;
    cart.increment(ProductId::new("3")).await?;

    // Quantities may sit at zero; the entry stays in the cart
    cart.decrement(ProductId::new("2")).await?;

    log_cart(&cart).await;

    // 6. Durability barrier, then end the session
    cart.flush().await?;
    tracing::info!("✓ All writes on disk");

    cart.shutdown(Duration::from_secs(10)).await?;
    tracing::info!("✓ Session 1 closed");

    // ── Session 2: restart and clear ───────────────────────────────────

    // 7. A fresh handle over the same directory sees the same cart
    let restarted = open_cart(&data_dir);
    restarted.hydrate().await?;
    tracing::info!(
        items = restarted.total_items().await,
        "Restart restored the cart"
    );

    // 8. Clearing empties memory but never writes to storage
    restarted.clear_cart().await?;
    tracing::info!(
        items = restarted.total_items().await,
        "Cart cleared in memory"
    );

    restarted.shutdown(Duration::from_secs(10)).await?;
    tracing::info!("✓ Session 2 closed");

    // ── Session 3: the clear was not durable ───────────────────────────

    // 9. The durable copy still holds the pre-clear products
    let after_clear = open_cart(&data_dir);
    after_clear.hydrate().await?;
    tracing::info!(
        items = after_clear.total_items().await,
        "Restart after clearing resurrected the pre-clear cart"
    );
    log_cart(&after_clear).await;

    // 10. Health and a few of the metrics recorded along the way
    let health = after_clear.health();
    tracing::info!(?health, "Cart health");

    if let Some(snapshot) = metrics.render() {
        for line in snapshot.lines().filter(|line| {
            line.starts_with("storage_writes_") || line.starts_with("store_actions_")
        }) {
            tracing::info!(metric = line, "Recorded");
        }
    }

    after_clear.shutdown(Duration::from_secs(10)).await?;
    tracing::info!("✓ Clean shutdown complete");

    Ok(())
}
