//! JSON codec for the persisted cart payload.
//!
//! The durable copy of the cart is a JSON array of products, each encoding
//! its five fields by name. The encoding round-trips exactly:
//! `decode(encode(x)) == x` for every well-formed product list, including
//! zero and negative quantities.

use thiserror::Error;

use crate::state::Product;

/// Errors produced while encoding or decoding the persisted cart.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload in storage is not a valid cart.
    #[error("Failed to decode cart payload: {0}")]
    Decode(serde_json::Error),

    /// The product list could not be serialized.
    #[error("Failed to encode cart payload: {0}")]
    Encode(serde_json::Error),
}

/// Serialize a product list for storage.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails (non-finite
/// prices are the only realistic cause).
pub fn encode(products: &[Product]) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(products).map_err(CodecError::Encode)
}

/// Deserialize a product list from storage.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the payload is not a JSON array of
/// products.
pub fn decode(payload: &[u8]) -> Result<Vec<Product>, CodecError> {
    serde_json::from_slice(payload).map_err(CodecError::Decode)
}
