//! # Trolley Core
//!
//! Core traits and types for the Trolley cart architecture.
//!
//! This crate provides the fundamental abstractions for building
//! reducer-driven state containers whose side effects are described as
//! values and executed by a runtime.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature
//! - **Action**: All possible inputs to a reducer (operations and feedback events)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use trolley_core::*;
//!
//! // Define your state
//! #[derive(Clone, Debug, Default)]
//! struct CartState {
//!     products: Vec<Product>,
//! }
//!
//! // Define your actions
//! #[derive(Clone, Debug)]
//! enum CartAction {
//!     AddToCart(ProductInfo),
//!     Increment(ProductId),
//! }
//!
//! // Implement the reducer
//! impl Reducer for CartReducer {
//!     type State = CartState;
//!     type Action = CartAction;
//!     type Environment = CartEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CartState,
//!         action: CartAction,
//!         env: &CartEnvironment,
//!     ) -> SmallVec<[Effect<CartAction>; 4]> {
//!         // Business logic goes here
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use smallvec::{SmallVec, smallvec};

mod effect_macros;

/// Key-value storage abstraction consumed by persistence effects
pub mod storage;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for CartReducer {
    ///     type State = CartState;
    ///     type Action = CartAction;
    ///     type Environment = CartEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut CartState,
    ///         action: CartAction,
    ///         env: &CartEnvironment,
    ///     ) -> SmallVec<[Effect<CartAction>; 4]> {
    ///         match action {
    ///             CartAction::ClearCart => {
    ///                 state.products.clear();
    ///                 smallvec![Effect::None]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place through its exclusive borrow
        /// 3. Returns effect descriptions to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values, not running work, so reducers stay pure.
pub mod effect {
    use crate::storage::{KvError, KvStore, StorageKey};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    /// Callback invoked with the payload of a successful storage read.
    ///
    /// Returns `Some(action)` to feed an action back into the reducer.
    pub type LoadSuccess<Action> =
        Box<dyn FnOnce(Option<Vec<u8>>) -> Option<Action> + Send>;

    /// Callback invoked when a storage read fails.
    pub type LoadFailure<Action> = Box<dyn FnOnce(KvError) -> Option<Action> + Send>;

    /// Storage operations requested by reducers and executed by the runtime.
    ///
    /// Operations carry their own store handle so the runtime can execute
    /// them without knowing the environment type.
    pub enum StorageOperation<Action> {
        /// Read the value stored under `key`.
        ///
        /// The read is awaited by the runtime and its outcome is mapped to
        /// a feedback action through the callbacks. A missing key is a
        /// success with `None`, not an error.
        Load {
            /// Store to read from.
            store: Arc<dyn KvStore>,
            /// Key to read.
            key: StorageKey,
            /// Maps the payload (or its absence) to a feedback action.
            on_success: LoadSuccess<Action>,
            /// Maps a read failure to a feedback action.
            on_error: LoadFailure<Action>,
        },

        /// Write `value` under `key` through the runtime's writer queue.
        ///
        /// Fire-and-forget: there are no callbacks. The writer retries
        /// transient failures, logs, and dead-letters what it cannot save;
        /// nothing is surfaced to the operation that produced the write.
        Save {
            /// Store to write to.
            store: Arc<dyn KvStore>,
            /// Key to write under.
            key: StorageKey,
            /// Serialized payload.
            value: Vec<u8>,
        },
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the Store
    /// runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into
        /// the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Storage operation (read awaited by the runtime, write queued)
        Storage(StorageOperation<Action>),
    }

    // Manual Debug implementations since futures and callbacks don't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Storage(op) => f.debug_tuple("Effect::Storage").field(op).finish(),
            }
        }
    }

    impl<Action> std::fmt::Debug for StorageOperation<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                StorageOperation::Load { key, .. } => f
                    .debug_struct("StorageOperation::Load")
                    .field("key", key)
                    .finish_non_exhaustive(),
                StorageOperation::Save { key, value, .. } => f
                    .debug_struct("StorageOperation::Save")
                    .field("key", key)
                    .field("value_len", &value.len())
                    .finish_non_exhaustive(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;

    #[derive(Debug, Clone)]
    enum TestAction {
        Done,
    }

    #[test]
    fn effect_none_debug() {
        let effect: Effect<TestAction> = Effect::None;
        assert_eq!(format!("{effect:?}"), "Effect::None");
    }

    #[test]
    fn effect_future_debug_hides_future() {
        let effect: Effect<TestAction> =
            Effect::Future(Box::pin(async { Some(TestAction::Done) }));
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }
}
