//! Cart state types.
//!
//! This module defines the in-memory representation of the cart. All types
//! are `Clone`; the reducer produces new values rather than sharing mutable
//! entries with consumers.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a product.
///
/// Acts as the primary key within the cart: the product list never holds
/// two entries with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    /// Create a product id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Product Types
// ═══════════════════════════════════════════════════════════════════════

/// Product descriptor accepted by `AddToCart`.
///
/// Deliberately carries no quantity: a product *entering* the cart always
/// starts at quantity 1, and a repeated add is an increment. Making the
/// quantity-less payload its own type keeps that contract in the type
/// system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Unique product identifier.
    pub id: ProductId,

    /// Display title. Expected non-empty; not validated here.
    pub title: String,

    /// Image location. Opaque to the cart, no validation.
    pub image_url: String,

    /// Unit price. Expected ≥ 0; not validated here.
    pub price: f64,
}

/// One line item as stored in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,

    /// Display title.
    pub title: String,

    /// Image location.
    pub image_url: String,

    /// Unit price.
    pub price: f64,

    /// Units of this product in the cart.
    ///
    /// May reach 0 or go negative through repeated decrements; entries are
    /// never removed or clamped by the reducer.
    pub quantity: i64,
}

impl From<ProductInfo> for Product {
    /// A product enters the cart with quantity 1.
    fn from(info: ProductInfo) -> Self {
        Self {
            id: info.id,
            title: info.title,
            image_url: info.image_url,
            price: info.price,
            quantity: 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Hydration Phase
// ═══════════════════════════════════════════════════════════════════════

/// Where the cart stands in its startup synchronization.
///
/// The phase only ever moves forward: `Uninitialized → Loading → Ready`.
/// There is no transition back; once `Ready`, every operation is a
/// synchronous state transition with fire-and-forget persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HydrationPhase {
    /// No hydration attempt has been made yet.
    #[default]
    Uninitialized,

    /// The storage read is in flight.
    Loading,

    /// Hydration finished (successfully or not); the cart is live.
    Ready,
}

impl HydrationPhase {
    /// Check whether hydration has completed.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Cart State
// ═══════════════════════════════════════════════════════════════════════

/// Root cart state.
///
/// Products are kept in insertion order; existing entries keep their
/// position across quantity changes and new entries append at the end.
///
/// # Examples
///
/// ```
/// # use trolley_cart::CartState;
/// let state = CartState::default();
/// assert!(state.products.is_empty());
/// assert!(!state.phase.is_ready());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    /// Ordered product list; `id` is the primary key, no duplicates.
    pub products: Vec<Product>,

    /// Startup synchronization phase. Not persisted.
    pub phase: HydrationPhase,
}

impl CartState {
    /// Check whether any entry carries the given id.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.products.iter().any(|p| &p.id == id)
    }

    /// Total units across all entries.
    #[must_use]
    pub fn total_items(&self) -> i64 {
        self.products.iter().map(|p| p.quantity).sum()
    }

    /// Price times quantity, summed across all entries.
    #[allow(clippy::cast_precision_loss)] // quantities are far below 2^52
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.products
            .iter()
            .map(|p| p.price * p.quantity as f64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> ProductInfo {
        ProductInfo {
            id: ProductId::new("1"),
            title: "Shirt".to_string(),
            image_url: "https://example.com/shirt.png".to_string(),
            price: 50.0,
        }
    }

    #[test]
    fn products_enter_the_cart_with_quantity_one() {
        let product = Product::from(shirt());
        assert_eq!(product.quantity, 1);
        assert_eq!(product.id, ProductId::new("1"));
    }

    #[test]
    fn default_state_is_empty_and_uninitialized() {
        let state = CartState::default();
        assert!(state.products.is_empty());
        assert_eq!(state.phase, HydrationPhase::Uninitialized);
    }

    #[test]
    fn totals_sum_over_entries() {
        let mut state = CartState::default();
        state.products.push(Product {
            quantity: 2,
            ..Product::from(shirt())
        });
        state.products.push(Product {
            id: ProductId::new("2"),
            title: "Mug".to_string(),
            image_url: "https://example.com/mug.png".to_string(),
            price: 10.5,
            quantity: 3,
        });

        assert_eq!(state.total_items(), 5);
        assert!((state.subtotal() - 131.5).abs() < f64::EPSILON);
    }

    #[test]
    fn contains_matches_by_id() {
        let mut state = CartState::default();
        state.products.push(Product::from(shirt()));

        assert!(state.contains(&ProductId::new("1")));
        assert!(!state.contains(&ProductId::new("2")));
    }
}
