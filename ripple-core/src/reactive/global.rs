//! Thread-local default engine.
//!
//! Code that needs just one reactive domain per thread can use these free
//! functions instead of passing an [`Engine`] around. Each thread gets its own
//! engine, created on first use.

use super::effect::{Effect, EffectOptions};
use super::runtime::Engine;
use crate::data::Value;

thread_local! {
    static DEFAULT_ENGINE: Engine = Engine::new();
}

/// The calling thread's default engine.
pub fn default_engine() -> Engine {
    DEFAULT_ENGINE.with(Engine::clone)
}

/// [`Engine::reactive`] on the default engine.
pub fn reactive(value: impl Into<Value>) -> Value {
    default_engine().reactive(value)
}

/// [`Engine::shallow_reactive`] on the default engine.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    default_engine().shallow_reactive(value)
}

/// [`Engine::readonly`] on the default engine.
pub fn readonly(value: impl Into<Value>) -> Value {
    default_engine().readonly(value)
}

/// [`Engine::shallow_readonly`] on the default engine.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    default_engine().shallow_readonly(value)
}

/// [`Engine::effect`] on the default engine.
///
/// The engine holds effects weakly, so the returned handle is what keeps the
/// effect registered. Calling `effect(..)` as a statement and discarding the
/// handle runs the computation once (unless lazy) and then retires it:
/// later writes rerun nothing. Bind the handle (`let _effect = effect(..)`;
/// a bare `_` pattern drops it immediately) for as long as the effect
/// should stay live.
pub fn effect<F>(f: F, options: EffectOptions) -> Effect
where
    F: Fn() + 'static,
{
    default_engine().effect(f, options)
}
