//! Error types for cart operations.

use thiserror::Error;

use crate::codec::CodecError;
use trolley_runtime::StoreError;

/// Result type alias for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;

/// Error taxonomy for the cart surface.
///
/// Mutating operations almost never fail: in-memory updates are total and
/// persistence is fire-and-forget. What remains is hydration (the one
/// awaited storage read), codec problems, and runtime lifecycle errors
/// such as operating on a cart that is shutting down.
#[derive(Debug, Error)]
pub enum CartError {
    /// The persisted cart could not be restored.
    ///
    /// The in-memory cart stays live (and empty), so the surface remains
    /// usable; this variant is what lets callers distinguish "empty cart"
    /// from "could not read cart".
    #[error("Failed to restore cart from storage: {reason}")]
    HydrationFailed {
        /// Why the stored cart could not be loaded.
        reason: String,
    },

    /// The cart payload could not be encoded or decoded.
    #[error("Cart codec error: {0}")]
    Codec(#[from] CodecError),

    /// The store runtime rejected or failed the operation.
    ///
    /// [`StoreError::ShutdownInProgress`] means the handle outlived its
    /// store: the value still exists but no longer accepts operations.
    #[error("Cart store error: {0}")]
    Store(#[from] StoreError),
}

impl CartError {
    /// Returns `true` if the error came from the hydration path.
    ///
    /// # Examples
    ///
    /// ```
    /// # use trolley_cart::CartError;
    /// let error = CartError::HydrationFailed {
    ///     reason: "payload is not valid JSON".to_string(),
    /// };
    /// assert!(error.is_hydration_failure());
    /// ```
    #[must_use]
    pub const fn is_hydration_failure(&self) -> bool {
        matches!(self, Self::HydrationFailed { .. })
    }

    /// Returns `true` if the operation was rejected because the cart is
    /// shutting down.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Store(StoreError::ShutdownInProgress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydration_failure_carries_its_reason() {
        let error = CartError::HydrationFailed {
            reason: "backend unavailable".to_string(),
        };

        assert!(error.is_hydration_failure());
        assert!(!error.is_shutdown());
        assert_eq!(
            format!("{error}"),
            "Failed to restore cart from storage: backend unavailable"
        );
    }

    #[test]
    fn shutdown_is_detected_through_the_store_variant() {
        let error = CartError::from(StoreError::ShutdownInProgress);

        assert!(error.is_shutdown());
        assert!(!error.is_hydration_failure());
    }

    #[test]
    fn codec_errors_convert() {
        let codec_error = crate::codec::decode(b"not json").unwrap_err();

        let error = CartError::from(codec_error);
        assert!(matches!(error, CartError::Codec(_)));
    }
}
