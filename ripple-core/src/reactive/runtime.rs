//! Reactive Engine
//!
//! The engine is the central coordinator that connects effects, the
//! dependency store and the observation wrappers.
//!
//! # How It Works
//!
//! 1. An effect runs with itself on top of the engine's active-effect stack.
//!
//! 2. Each read through a mutable wrapper calls [`Engine::track`], which
//!    records the active effect under the target and key that were read.
//!
//! 3. Each effective write through a mutable wrapper calls
//!    [`Engine::trigger`], which:
//!    a. Collects the effects recorded under the written key (plus length
//!       watchers and dropped indices for arrays)
//!    b. Deduplicates them, keeping first-recorded order
//!    c. Reruns each of them synchronously before returning
//!
//! # Isolation
//!
//! All state lives in the engine instance, so independent engines never see
//! each other's effects. Engines are single-threaded (`!Send`); use one per
//! thread, or the thread-local default from [`default_engine`](super::default_engine).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, trace};

use super::context::{ActiveEffectStack, TriggerDepthGuard};
use super::deps::{collect_live, DependencyStore};
use super::effect::{DepEdge, Effect, EffectId, EffectOptions};
use super::observed::WrapperCache;
use crate::config::EngineConfig;
use crate::data::{array_length, Key, Target, Value};
use crate::error::{ReactiveError, Result};

/// The kind of read being tracked. Recorded for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
}

/// The kind of write being triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// A key that did not exist before was written.
    Add,
    /// An existing key changed value.
    Set,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    deps: RefCell<DependencyStore>,
    active: ActiveEffectStack,
    trigger_depth: Cell<usize>,
    reactive_cache: RefCell<WrapperCache>,
    readonly_cache: RefCell<WrapperCache>,
}

/// An isolated reactive domain.
///
/// Cloning an `Engine` yields another handle to the same domain.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                config,
                deps: RefCell::new(DependencyStore::default()),
                active: ActiveEffectStack::default(),
                trigger_depth: Cell::new(0),
                reactive_cache: RefCell::new(WrapperCache::default()),
                readonly_cache: RefCell::new(WrapperCache::default()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn active_stack(&self) -> &ActiveEffectStack {
        &self.inner.active
    }

    pub(crate) fn wrapper_cache(&self, readonly: bool) -> &RefCell<WrapperCache> {
        if readonly {
            &self.inner.readonly_cache
        } else {
            &self.inner.reactive_cache
        }
    }

    /// Register `f` as an effect.
    ///
    /// Unless `options.lazy` is set the effect runs once before this returns.
    /// The returned handle keeps the effect alive.
    pub fn effect<F>(&self, f: F, options: EffectOptions) -> Effect
    where
        F: Fn() + 'static,
    {
        let effect = Effect::new(self.clone(), Box::new(f), options);
        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// The effect currently running, if any.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.active.current_id()
    }

    /// How many effects are running, nested inside one another.
    pub fn effect_depth(&self) -> usize {
        self.inner.active.depth()
    }

    /// Record that the active effect depends on `key` of `target`.
    ///
    /// Does nothing when no effect is running.
    pub fn track(&self, target: &Target, op: TrackOp, key: &Key) {
        let Some(effect) = self.inner.active.current() else {
            return;
        };

        let added = self.inner.deps.borrow_mut().insert(target, key, &effect);
        if added {
            effect.record_dep(target.id(), key.clone());
            trace!(effect = effect.id().raw(), target_id = target.id().raw(), %key, ?op, "tracked");
        }
    }

    /// Rerun every effect that depends on the written `key` of `target`.
    ///
    /// `new_value` must be the value just written; for an array `length`
    /// write it decides which tracked indices were dropped. `old_value` is
    /// informational.
    ///
    /// Returns [`ReactiveError::TriggerDepthExceeded`] without running
    /// anything if the configured nesting limit is reached.
    pub fn trigger(
        &self,
        target: &Target,
        op: TriggerOp,
        key: &Key,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
    ) -> Result<()> {
        let effects = {
            let mut store = self.inner.deps.borrow_mut();
            let Some(entry) = store.get_mut(target.id()) else {
                return Ok(());
            };

            let mut collected = IndexMap::new();
            if key.is_length() && target.is_array() {
                let new_len = new_value.and_then(array_length);
                for (tracked, set) in entry.keys_mut() {
                    // The index equal to the new length is removed too.
                    let dropped = match (tracked.as_index(), new_len) {
                        (Some(index), Some(len)) => index >= len,
                        _ => false,
                    };
                    if dropped || tracked.is_length() {
                        collect_live(set, &mut collected);
                    }
                }
            } else {
                if let Some(set) = entry.get_mut(key) {
                    collect_live(set, &mut collected);
                }
                if op == TriggerOp::Add && target.is_array() && key.as_index().is_some() {
                    if let Some(set) = entry.get_mut(&Key::length()) {
                        collect_live(set, &mut collected);
                    }
                }
            }
            collected
        };

        if effects.is_empty() {
            return Ok(());
        }

        let limit = self.inner.config.max_trigger_depth;
        let Some(_depth) = TriggerDepthGuard::enter(&self.inner.trigger_depth, limit) else {
            let limit = limit.unwrap_or_default();
            error!(target_id = target.id().raw(), %key, limit, "trigger depth limit exceeded");
            return Err(ReactiveError::TriggerDepthExceeded {
                limit,
                key: key.clone(),
            });
        };

        debug!(
            target_id = target.id().raw(),
            %key,
            ?op,
            new = ?new_value,
            old = ?old_value,
            effects = effects.len(),
            "triggering"
        );
        for effect in effects.into_values() {
            effect.run();
        }
        Ok(())
    }

    /// Remove an effect from the sets named by `edges`.
    pub(crate) fn untrack(&self, effect: EffectId, edges: &[DepEdge]) {
        let mut store = self.inner.deps.borrow_mut();
        for edge in edges {
            store.remove(edge.target, &edge.key, effect);
        }
    }

    /// Number of live effects depending on `key` of `target`.
    pub fn dependent_count(&self, target: &Target, key: impl Into<Key>) -> usize {
        self.inner
            .deps
            .borrow()
            .dependent_count(target.id(), &key.into())
    }

    /// Number of targets the dependency store holds entries for.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Release dependency and wrapper-cache entries for targets that are gone.
    ///
    /// Returns the number of entries removed. This also happens
    /// automatically as the store and caches grow.
    pub fn sweep(&self) -> usize {
        let deps = self.inner.deps.borrow_mut().sweep();
        let reactive = self.inner.reactive_cache.borrow_mut().sweep();
        let readonly = self.inner.readonly_cache.borrow_mut().sweep();
        debug!(deps, reactive, readonly, "swept engine");
        deps + reactive + readonly
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("tracked_targets", &self.tracked_target_count())
            .field("effect_depth", &self.effect_depth())
            .finish()
    }
}
