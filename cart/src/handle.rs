//! Consumer surface for the cart.
//!
//! [`CartHandle`] is the explicitly constructed provider object: it owns
//! the store running the cart reducer and exposes the cart operations,
//! snapshot readers, and lifecycle controls. Consumers receive a handle
//! (or a clone of one) through dependency injection; there is no global
//! registry, so "using the cart without a provider" is unrepresentable.
//!
//! The runtime analog of that misuse, operating on a handle after
//! `shutdown`, fails fast with a
//! [`StoreError::ShutdownInProgress`](trolley_runtime::StoreError::ShutdownInProgress)
//! mapped through [`CartError`].

use std::sync::Arc;
use std::time::Duration;

use trolley_core::storage::KvStore;
use trolley_runtime::{HealthCheck, Store, StoreConfig};

use crate::actions::CartAction;
use crate::environment::CartEnvironment;
use crate::error::{CartError, Result};
use crate::reducer::CartReducer;
use crate::state::{CartState, HydrationPhase, Product, ProductId, ProductInfo};

/// How long [`CartHandle::hydrate`] waits for the storage read to resolve.
///
/// Covers the store's default retry policy worst case with room to spare;
/// a backend that cannot answer within this window surfaces as
/// [`StoreError::Timeout`](trolley_runtime::StoreError::Timeout).
pub const DEFAULT_HYDRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to a running cart.
///
/// Owns the store coordinating the cart reducer, its state, and its
/// persistence. Clones share the same underlying store, so handing out
/// clones is how multiple consumers observe one cart.
///
/// # Lifecycle
///
/// ```ignore
/// let cart = CartHandle::new(storage);
/// cart.hydrate().await?;
///
/// cart.add_to_cart(product).await?;
/// cart.increment(id).await?;
///
/// cart.flush().await?;
/// cart.shutdown(Duration::from_secs(30)).await?;
/// ```
#[derive(Clone)]
pub struct CartHandle {
    store: Store<CartState, CartAction, CartEnvironment, CartReducer>,
}

impl CartHandle {
    /// Create a cart persisting under [`CART_STORAGE_KEY`](crate::CART_STORAGE_KEY).
    ///
    /// The cart starts empty and `Uninitialized`; call [`hydrate`](Self::hydrate)
    /// before the first operation to restore the persisted state.
    #[must_use]
    pub fn new(storage: Arc<dyn KvStore>) -> Self {
        Self::with_environment(CartEnvironment::new(storage))
    }

    /// Create a cart against a prepared environment.
    ///
    /// Use this to run a cart under a custom storage key.
    #[must_use]
    pub fn with_environment(environment: CartEnvironment) -> Self {
        Self {
            store: Store::new(CartState::default(), CartReducer::new(), environment),
        }
    }

    /// Create a cart with custom runtime configuration.
    ///
    /// Exposes the store knobs: retry policy for failed writes, dead
    /// letter queue capacity, broadcast capacity, shutdown timeout.
    #[must_use]
    pub fn with_config(environment: CartEnvironment, config: StoreConfig) -> Self {
        Self {
            store: Store::with_config(
                CartState::default(),
                CartReducer::new(),
                environment,
                config,
            ),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Hydration
    // ═══════════════════════════════════════════════════════════════════

    /// Restore the persisted cart from storage.
    ///
    /// Sends `Hydrate` and waits for the terminal feedback action. A
    /// missing key is a first run: the cart comes up empty and this
    /// returns `Ok`. Read and decode failures also leave the cart empty
    /// and usable, but return an error so callers can tell "empty cart"
    /// from "could not read cart".
    ///
    /// Hydration is one-shot. Calling this on a cart that is already
    /// `Ready` returns `Ok` without touching storage; a concurrent call
    /// while the read is in flight waits for the same terminal action.
    ///
    /// # Errors
    ///
    /// - [`CartError::HydrationFailed`]: the payload could not be read or
    ///   decoded (after the store's retry policy was exhausted)
    /// - [`CartError::Store`]: timeout waiting for the read, or the store
    ///   is shutting down
    pub async fn hydrate(&self) -> Result<()> {
        // Once the cart is live there is nothing left to load, and the
        // reducer would ignore the action; skip the wait entirely.
        if self.store.state(|s| s.phase.is_ready()).await {
            tracing::debug!("Cart already hydrated, skipping");
            return Ok(());
        }

        let terminal = self
            .store
            .send_and_wait_for(
                CartAction::Hydrate,
                |a| {
                    matches!(
                        a,
                        CartAction::Hydrated { .. } | CartAction::HydrationFailed { .. }
                    )
                },
                DEFAULT_HYDRATION_TIMEOUT,
            )
            .await?;

        match terminal {
            CartAction::HydrationFailed { reason } => Err(CartError::HydrationFailed { reason }),
            // The predicate admits only Hydrated here
            _ => Ok(()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════

    /// Add a product to the cart.
    ///
    /// A fresh id appends a new entry with quantity 1; an id already in
    /// the cart bumps the existing entry instead. Returns once in-memory
    /// state is updated and the write is queued.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn add_to_cart(&self, product: ProductInfo) -> Result<()> {
        self.store.send(CartAction::AddToCart { product }).await?;
        Ok(())
    }

    /// Raise the quantity of an entry by one.
    ///
    /// Unknown ids are a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn increment(&self, id: ProductId) -> Result<()> {
        self.store.send(CartAction::Increment { id }).await?;
        Ok(())
    }

    /// Lower the quantity of an entry by one.
    ///
    /// Unknown ids are a silent no-op. The quantity may reach 0 and go
    /// negative; the entry is never removed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn decrement(&self, id: ProductId) -> Result<()> {
        self.store.send(CartAction::Decrement { id }).await?;
        Ok(())
    }

    /// Remove every entry from the in-memory cart.
    ///
    /// Does not write to storage: the durable copy keeps the pre-clear
    /// products until the next mutating operation overwrites it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn clear_cart(&self) -> Result<()> {
        self.store.send(CartAction::ClearCart).await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Snapshot readers
    // ═══════════════════════════════════════════════════════════════════

    /// Ordered snapshot of the cart's products.
    ///
    /// Returns a clone; the caller never holds a reference into live
    /// state, so snapshots cannot alias concurrent mutations.
    pub async fn products(&self) -> Vec<Product> {
        self.store.state(|s| s.products.clone()).await
    }

    /// Current hydration phase.
    pub async fn phase(&self) -> HydrationPhase {
        self.store.state(|s| s.phase).await
    }

    /// Total units across all entries.
    pub async fn total_items(&self) -> i64 {
        self.store.state(CartState::total_items).await
    }

    /// Price times quantity, summed across all entries.
    pub async fn subtotal(&self) -> f64 {
        self.store.state(CartState::subtotal).await
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════

    /// Wait until every write queued before this call has completed.
    ///
    /// The explicit durability barrier: after this returns `Ok`, every
    /// previously queued save has either been applied to storage or
    /// recorded in the dead letter queue.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if a writer task went away before
    /// acknowledging.
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await?;
        Ok(())
    }

    /// Gracefully shut the cart down.
    ///
    /// Rejects new operations, then waits for in-flight effects and
    /// queued writes to drain. Operations sent after this starts fail
    /// with
    /// [`StoreError::ShutdownInProgress`](trolley_runtime::StoreError::ShutdownInProgress)
    /// mapped through [`CartError::Store`].
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] wrapping
    /// [`StoreError::ShutdownTimeout`](trolley_runtime::StoreError::ShutdownTimeout)
    /// if pending work outlives `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }

    /// Health of the cart's runtime.
    ///
    /// Degrades as the dead letter queue fills with writes that exhausted
    /// their retries.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        self.store.health()
    }
}

// Integration tests are in cart/tests/cart_integration.rs
