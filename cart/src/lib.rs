//! # Trolley Cart
//!
//! Shopping cart state container with write-through persistence.
//!
//! The cart holds an ordered list of products with quantities, keeps a
//! serialized copy in a durable key-value store, and exposes a small set
//! of operations to consumers through a cloneable handle.
//!
//! ## Features
//!
//! - **Pure reducer**: every state transition is a side-effect-free function
//! - **Write-through persistence**: mutations queue a storage write without
//!   blocking the caller
//! - **Startup hydration**: one read restores the cart across restarts
//! - **Explicit injection**: consumers receive a [`CartHandle`], no global
//!   context lookup
//! - **Testable**: cart logic runs at memory speed against mock stores
//!
//! ## Architecture
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use trolley_cart::{CartHandle, ProductInfo, ProductId};
//!
//! let cart = CartHandle::new(storage);
//!
//! // 1. Restore whatever the last run persisted
//! cart.hydrate().await?;
//!
//! // 2. Mutate; the caller returns as soon as memory is updated
//! cart.add_to_cart(ProductInfo {
//!     id: ProductId::new("1"),
//!     title: "Shirt".to_string(),
//!     image_url: "https://example.com/shirt.png".to_string(),
//!     price: 50.0,
//! }).await?;
//!
//! // 3. Durability barrier before process exit
//! cart.flush().await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod codec;
pub mod environment;
pub mod error;
pub mod handle;
pub mod reducer;
pub mod state;

/// Namespace key the serialized cart is stored under.
///
/// Compatibility constant: payloads written by earlier releases live under
/// this exact key, so it must not change without a migration path.
pub const CART_STORAGE_KEY: &str = "@GoMarketPlace";

// Re-export main types for convenience
pub use actions::CartAction;
pub use environment::CartEnvironment;
pub use error::{CartError, Result};
pub use handle::CartHandle;
pub use reducer::CartReducer;
pub use state::{CartState, HydrationPhase, Product, ProductId, ProductInfo};
