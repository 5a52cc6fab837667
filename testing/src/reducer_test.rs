//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable
//! Given-When-Then syntax, plus assertion helpers for the effect lists
//! reducers return.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use trolley_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Runs the reducer once, synchronously, against a state you provide, then
/// hands the mutated state and the returned effects to your assertions.
/// Effects are *described*, never executed, so no runtime is needed.
///
/// # Example
///
/// ```ignore
/// use trolley_testing::ReducerTest;
/// use trolley_testing::reducer_test::assertions;
///
/// ReducerTest::new(CartReducer)
///     .with_env(test_environment())
///     .given_state(cart_with_one_product())
///     .when_action(CartAction::Increment(product_id))
///     .then_state(|state| {
///         assert_eq!(state.products[0].quantity, 2);
///     })
///     .then_effects(|effects| {
///         assertions::assert_has_storage_save(effects);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the returned effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the reducer and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let effects = self.reducer.reduce(&mut state, action, &env);

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use trolley_core::effect::{Effect, StorageOperation};
    use trolley_core::storage::StorageKey;

    /// Assert that there are no effects
    ///
    /// An empty list and a single [`Effect::None`] both count as "no effects".
    ///
    /// # Panics
    ///
    /// Panics if any real effect is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that effects contain at least one storage save
    ///
    /// # Panics
    ///
    /// Panics if no storage save effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_storage_save<A>(effects: &[Effect<A>]) {
        assert!(
            effects
                .iter()
                .any(|e| matches!(e, Effect::Storage(StorageOperation::Save { .. }))),
            "Expected at least one storage save effect, but none found"
        );
    }

    /// Assert that effects contain at least one storage load
    ///
    /// # Panics
    ///
    /// Panics if no storage load effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_storage_load<A>(effects: &[Effect<A>]) {
        assert!(
            effects
                .iter()
                .any(|e| matches!(e, Effect::Storage(StorageOperation::Load { .. }))),
            "Expected at least one storage load effect, but none found"
        );
    }

    /// Assert on the key and payload of the first storage save effect
    ///
    /// Lets tests inspect what a reducer is about to persist without
    /// executing the effect:
    ///
    /// ```ignore
    /// assertions::assert_storage_save_payload(&effects, |key, payload| {
    ///     assert_eq!(key.as_str(), "@GoMarketPlace");
    ///     let products: Vec<Product> = serde_json::from_slice(payload).unwrap();
    ///     assert_eq!(products.len(), 2);
    /// });
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if no storage save effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_storage_save_payload<A, F>(effects: &[Effect<A>], f: F)
    where
        F: FnOnce(&StorageKey, &[u8]),
    {
        let found = effects.iter().find_map(|e| match e {
            Effect::Storage(StorageOperation::Save { key, value, .. }) => Some((key, value)),
            _ => None,
        });

        match found {
            Some((key, value)) => f(key, value),
            None => panic!("Expected a storage save effect, but none found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trolley_core::save_value;
    use trolley_core::storage::{KvStore, StorageKey};

    use crate::mocks::MemoryKv;

    #[derive(Clone, Debug)]
    struct TallyState {
        items: i64,
    }

    #[derive(Clone, Debug)]
    enum TallyAction {
        Add,
        Remove,
        Persist,
    }

    struct TallyEnv {
        kv: Arc<dyn KvStore>,
        key: StorageKey,
    }

    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Action = TallyAction;
        type Environment = TallyEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> smallvec::SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TallyAction::Add => {
                    state.items += 1;
                    smallvec::smallvec![Effect::None]
                }
                TallyAction::Remove => {
                    state.items -= 1;
                    smallvec::smallvec![Effect::None]
                }
                TallyAction::Persist => {
                    let payload = state.items.to_le_bytes().to_vec();
                    smallvec::smallvec![save_value!(env.kv, env.key.clone(), payload)]
                }
            }
        }
    }

    fn tally_env() -> TallyEnv {
        TallyEnv {
            kv: Arc::new(MemoryKv::new()),
            key: StorageKey::new("tally"),
        }
    }

    #[test]
    fn add_increments_state() {
        ReducerTest::new(TallyReducer)
            .with_env(tally_env())
            .given_state(TallyState { items: 0 })
            .when_action(TallyAction::Add)
            .then_state(|state| {
                assert_eq!(state.items, 1);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn remove_decrements_state() {
        ReducerTest::new(TallyReducer)
            .with_env(tally_env())
            .given_state(TallyState { items: 5 })
            .when_action(TallyAction::Remove)
            .then_state(|state| {
                assert_eq!(state.items, 4);
            })
            .run();
    }

    #[test]
    fn persist_emits_a_storage_save() {
        ReducerTest::new(TallyReducer)
            .with_env(tally_env())
            .given_state(TallyState { items: 3 })
            .when_action(TallyAction::Persist)
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_storage_save(effects);
                assertions::assert_storage_save_payload(effects, |key, payload| {
                    assert_eq!(key.as_str(), "tally");
                    assert_eq!(payload, 3i64.to_le_bytes().as_slice());
                });
            })
            .run();
    }

    #[test]
    fn no_effects_accepts_empty_and_none() {
        assertions::assert_no_effects::<TallyAction>(&[Effect::None]);
        assertions::assert_no_effects::<TallyAction>(&[]);
    }

    #[test]
    fn effects_count_matches() {
        assertions::assert_effects_count(&[Effect::<TallyAction>::None], 1);
        assertions::assert_effects_count::<TallyAction>(&[], 0);
    }
}
