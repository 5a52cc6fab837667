//! Macros for reducing boilerplate when constructing effects.
//!
//! Storage effects carry a store handle plus boxed callbacks, which makes
//! them verbose to build inline in reducers. These macros keep reducer
//! match arms readable.

/// Create a storage load effect.
///
/// Reads the payload stored under `key` and maps the outcome to feedback
/// actions. An absent key reaches `on_success` as `None`.
///
/// # Example
///
/// ```ignore
/// let effect = load_value!(
///     env.storage,
///     env.key.clone(),
///     |payload| Some(CartAction::payload_loaded(payload)),
///     |error| Some(CartAction::load_failed(error))
/// );
/// ```
#[macro_export]
macro_rules! load_value {
    ($store:expr, $key:expr, |$payload:ident| $on_success:expr, |$error:ident| $on_error:expr) => {
        $crate::effect::Effect::Storage($crate::effect::StorageOperation::Load {
            store: ::std::sync::Arc::clone(&$store),
            key: $crate::storage::StorageKey::from($key),
            on_success: ::std::boxed::Box::new(move |$payload| $on_success),
            on_error: ::std::boxed::Box::new(move |$error| $on_error),
        })
    };
}

/// Create a storage save effect.
///
/// Replaces the payload stored under `key`. The write is fire-and-forget:
/// the runtime queues it on the key's writer and the reducer never hears
/// back. Failures are retried and logged by the runtime.
///
/// # Example
///
/// ```ignore
/// let effect = save_value!(env.storage, env.key.clone(), encoded_bytes);
/// ```
#[macro_export]
macro_rules! save_value {
    ($store:expr, $key:expr, $value:expr) => {
        $crate::effect::Effect::Storage($crate::effect::StorageOperation::Save {
            store: ::std::sync::Arc::clone(&$store),
            key: $crate::storage::StorageKey::from($key),
            value: $value,
        })
    };
}

/// Create a future effect from an async block.
///
/// The block must evaluate to `Option<Action>`; `Some` feeds the action
/// back into the store, `None` ends the effect silently.
///
/// # Example
///
/// ```ignore
/// let effect = async_effect!(async move {
///     tokio::time::sleep(delay).await;
///     Some(CartAction::ClearCart)
/// });
/// ```
#[macro_export]
macro_rules! async_effect {
    ($future:expr) => {
        $crate::effect::Effect::Future(::std::boxed::Box::pin($future))
    };
}
