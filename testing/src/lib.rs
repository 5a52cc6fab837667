//! # Trolley Testing
//!
//! Testing utilities and helpers for the Trolley cart architecture.
//!
//! This crate provides:
//! - Mock storage backends ([`MemoryKv`], [`FailingKv`])
//! - A fluent Given-When-Then harness for reducers ([`ReducerTest`])
//! - Property-based testing strategies for storage types
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use trolley_testing::{MemoryKv, ReducerTest};
//! use trolley_testing::reducer_test::assertions;
//!
//! ReducerTest::new(CartReducer)
//!     .with_env(test_environment())
//!     .given_state(CartState::default())
//!     .when_action(CartAction::ClearCart)
//!     .then_state(|state| {
//!         assert!(state.products.is_empty());
//!     })
//!     .then_effects(|effects| {
//!         assertions::assert_no_effects(effects);
//!     })
//!     .run();
//! ```

/// Mock storage backends for tests
pub mod mocks;

/// Fluent Given-When-Then harness for reducers
pub mod reducer_test;

/// Shared test helpers
pub mod helpers {
    /// Install a fmt subscriber honoring `RUST_LOG`
    ///
    /// Safe to call from every test. If a subscriber is already installed
    /// (for example by a previous test in the same binary), this is a no-op.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Property-based testing strategies for storage types
pub mod properties {
    use proptest::prelude::*;
    use trolley_core::storage::StorageKey;

    /// Strategy producing storage keys with the characters backends must
    /// tolerate (including `@`, `:` and path separators)
    pub fn storage_key_strategy() -> impl Strategy<Value = StorageKey> {
        "[A-Za-z0-9@:_./-]{1,64}".prop_map(StorageKey::from)
    }

    /// Strategy producing arbitrary binary payloads up to 512 bytes
    pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..512)
    }
}

// Re-export commonly used items
pub use mocks::{FailingKv, MemoryKv};
pub use reducer_test::{ReducerTest, assertions};
