//! Cart reducer.
//!
//! This reducer implements every cart state transition: the four operations
//! consumers call (add, increment, decrement, clear) and the hydration
//! lifecycle that restores the persisted cart at startup.
//!
//! # Persistence contract
//!
//! Mutating operations that change state return a storage save effect
//! carrying the serialized *new* product list. The runtime queues that
//! write on a per-key writer; the caller never waits for it. Two
//! deliberate gaps in that contract are pinned by tests:
//!
//! - operations on an unknown id are silent no-ops (no error, no write);
//! - `ClearCart` empties memory only. The durable copy keeps the
//!   pre-clear products until the next mutation overwrites it, so a
//!   restart right after clearing restores them.
//!
//! # Hydration state machine
//!
//! ```text
//! Uninitialized ──Hydrate──▶ Loading ──Hydrated / HydrationFailed──▶ Ready
//! ```
//!
//! The phase only moves forward. `Hydrate` outside `Uninitialized` and
//! hydration events outside `Loading` are ignored, so a stale or repeated
//! read can never clobber live state.

use trolley_core::effect::Effect;
use trolley_core::reducer::Reducer;
use trolley_core::{SmallVec, load_value, save_value, smallvec};

use crate::actions::CartAction;
use crate::codec;
use crate::environment::CartEnvironment;
use crate::state::{CartState, HydrationPhase, Product};

/// Cart reducer.
///
/// Stateless: all data lives in [`CartState`], all dependencies in
/// [`CartEnvironment`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CartReducer;

impl CartReducer {
    /// Create a new cart reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Describe the write-through save for the current product list.
    ///
    /// Encode failures are logged and swallowed: the in-memory update has
    /// already happened and persistence is best-effort, so the previous
    /// durable copy simply stays in place.
    fn persist(state: &CartState, env: &CartEnvironment) -> Effect<CartAction> {
        match codec::encode(&state.products) {
            Ok(payload) => save_value!(env.storage, env.key.clone(), payload),
            Err(error) => {
                tracing::error!(error = %error, "Failed to encode cart for persistence");
                Effect::None
            }
        }
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // AddToCart: append a new entry, or bump an existing one
            // ═══════════════════════════════════════════════════════════════
            CartAction::AddToCart { product } => {
                if state.contains(&product.id) {
                    // A repeated add is an increment. Re-enter with the
                    // increment action so both paths share one transition.
                    tracing::debug!(id = %product.id, "Product already in cart, delegating to Increment");
                    return self.reduce(state, CartAction::Increment { id: product.id }, env);
                }

                let product = Product::from(product);
                tracing::debug!(id = %product.id, title = %product.title, "Product added to cart");
                state.products.push(product);

                smallvec![Self::persist(state, env)]
            }

            // ═══════════════════════════════════════════════════════════════
            // Increment: quantity + 1, same position
            // ═══════════════════════════════════════════════════════════════
            CartAction::Increment { id } => {
                let Some(product) = state.products.iter_mut().find(|p| p.id == id) else {
                    // Unknown ids are ignored; nothing changed, so nothing
                    // is persisted.
                    tracing::debug!(%id, "Increment for unknown product id ignored");
                    return smallvec![Effect::None];
                };

                product.quantity += 1;
                tracing::debug!(%id, quantity = product.quantity, "Quantity incremented");

                smallvec![Self::persist(state, env)]
            }

            // ═══════════════════════════════════════════════════════════════
            // Decrement: quantity − 1, same position, no clamp
            // ═══════════════════════════════════════════════════════════════
            CartAction::Decrement { id } => {
                let Some(product) = state.products.iter_mut().find(|p| p.id == id) else {
                    tracing::debug!(%id, "Decrement for unknown product id ignored");
                    return smallvec![Effect::None];
                };

                // Quantity may reach 0 and keep going negative; the entry
                // stays in the list either way.
                product.quantity -= 1;
                tracing::debug!(%id, quantity = product.quantity, "Quantity decremented");

                smallvec![Self::persist(state, env)]
            }

            // ═══════════════════════════════════════════════════════════════
            // ClearCart: empty the list, in memory only
            // ═══════════════════════════════════════════════════════════════
            CartAction::ClearCart => {
                tracing::debug!(cleared = state.products.len(), "Cart cleared");
                state.products.clear();

                // No save: the durable copy keeps the pre-clear products,
                // and a restart before the next mutation restores them.
                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // Hydrate: start the one-shot storage read
            // ═══════════════════════════════════════════════════════════════
            CartAction::Hydrate => {
                if state.phase != HydrationPhase::Uninitialized {
                    tracing::warn!(phase = ?state.phase, "Hydrate ignored: cart has already hydrated");
                    return smallvec![Effect::None];
                }

                state.phase = HydrationPhase::Loading;
                tracing::debug!(key = %env.key, "Hydrating cart from storage");

                smallvec![load_value!(
                    env.storage,
                    env.key.clone(),
                    |payload| Some(match payload {
                        // First run: nothing stored yet is an empty cart,
                        // not a failure.
                        None => CartAction::Hydrated {
                            products: Vec::new(),
                        },
                        Some(bytes) => match codec::decode(&bytes) {
                            Ok(products) => CartAction::Hydrated { products },
                            Err(error) => CartAction::HydrationFailed {
                                reason: error.to_string(),
                            },
                        },
                    }),
                    |error| Some(CartAction::HydrationFailed {
                        reason: error.to_string(),
                    })
                )]
            }

            // ═══════════════════════════════════════════════════════════════
            // Hydrated: install the restored products
            // ═══════════════════════════════════════════════════════════════
            CartAction::Hydrated { products } => {
                if state.phase != HydrationPhase::Loading {
                    // No read is outstanding; applying this would clobber
                    // live state.
                    tracing::warn!(phase = ?state.phase, "Hydrated event outside Loading ignored");
                    return smallvec![Effect::None];
                }

                tracing::debug!(products = products.len(), "Cart hydrated");
                state.products = products;
                state.phase = HydrationPhase::Ready;

                // Hydration never writes back.
                smallvec![Effect::None]
            }

            // ═══════════════════════════════════════════════════════════════
            // HydrationFailed: go live with the empty cart we already have
            // ═══════════════════════════════════════════════════════════════
            CartAction::HydrationFailed { reason } => {
                if state.phase != HydrationPhase::Loading {
                    tracing::warn!(phase = ?state.phase, "HydrationFailed event outside Loading ignored");
                    return smallvec![Effect::None];
                }

                tracing::error!(%reason, "Cart hydration failed, continuing with empty cart");
                state.phase = HydrationPhase::Ready;

                smallvec![Effect::None]
            }
        }
    }
}
