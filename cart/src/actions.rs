//! Cart actions.
//!
//! This module defines all possible inputs to the cart reducer. Actions
//! follow the command/event split: commands express caller intent, events
//! report what an async effect found out.

use serde::{Deserialize, Serialize};

use crate::state::{Product, ProductId, ProductInfo};

/// Cart action.
///
/// Actions are the **only** way to change the cart. The reducer is a pure
/// function: `(State, Action, Env) → (State, Effects)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CartAction {
    // ═══════════════════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════════════════
    /// Put a product in the cart.
    ///
    /// If an entry with the same id already exists this behaves exactly
    /// like [`CartAction::Increment`] for that id; otherwise a new entry is
    /// appended with quantity 1.
    AddToCart {
        /// The product to add (no quantity; it always starts at 1).
        product: ProductInfo,
    },

    /// Raise the quantity of an existing entry by 1.
    ///
    /// Unknown ids are ignored.
    Increment {
        /// Id of the entry to bump.
        id: ProductId,
    },

    /// Lower the quantity of an existing entry by 1.
    ///
    /// Unknown ids are ignored. Quantities are not clamped: repeated
    /// decrements can reach 0 and keep going negative without removing
    /// the entry.
    Decrement {
        /// Id of the entry to lower.
        id: ProductId,
    },

    /// Empty the cart.
    ///
    /// In-memory only: the persisted copy is deliberately left untouched,
    /// so a restart before the next mutation restores the cleared products.
    ClearCart,

    /// Start hydration: read the persisted cart from storage.
    ///
    /// Only meaningful while the cart is `Uninitialized`; repeated sends
    /// are ignored.
    Hydrate,

    // ═══════════════════════════════════════════════════════════════════════
    // Events
    // ═══════════════════════════════════════════════════════════════════════
    /// The storage read completed and decoded.
    ///
    /// An absent key decodes to an empty product list.
    Hydrated {
        /// The restored product list.
        products: Vec<Product>,
    },

    /// The storage read failed or the payload would not decode.
    ///
    /// The cart becomes `Ready` without restoring anything, so the caller
    /// stays usable; the reason distinguishes "empty cart" from "could not
    /// read cart".
    HydrationFailed {
        /// What went wrong while loading.
        reason: String,
    },
}
