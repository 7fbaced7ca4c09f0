//! Effect Implementation
//!
//! An Effect is a computation that reruns whenever a wrapped property it read
//! is mutated.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately (unless it is lazy) so its
//!    reads can be tracked.
//!
//! 2. While it runs, the effect sits on top of the engine's active-effect
//!    stack. Every read through a mutable wrapper records the effect as a
//!    dependent of that property.
//!
//! 3. When one of those properties is written, the engine reruns the effect
//!    synchronously, before the write returns.
//!
//! # Lifetime
//!
//! The engine only holds weak references to effects. An effect keeps running
//! for as long as some [`Effect`] handle to it is alive; dropping the last
//! handle silently retires it. [`Effect::dispose`] retires it explicitly and
//! removes it from every dependency set it was recorded in.
//!
//! Dependencies are never cleared between runs: an edge recorded by an
//! earlier run keeps triggering the effect even if later runs stop reading
//! that property.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::context::ActiveEffectGuard;
use super::runtime::Engine;
use crate::data::{Key, TargetId};

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique, monotonically increasing identifier of an effect.
///
/// Ids order effects by creation. The tracking logic itself never looks at
/// them beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        Self(EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Options accepted by [`Engine::effect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOptions {
    /// Do not run the effect on creation.
    pub lazy: bool,
}

impl EffectOptions {
    /// Options for an effect that only runs when called or triggered.
    pub fn lazy() -> Self {
        Self { lazy: true }
    }
}

/// A dependency edge recorded by an effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DepEdge {
    pub(crate) target: TargetId,
    pub(crate) key: Key,
}

pub(crate) struct EffectInner {
    id: EffectId,
    options: EffectOptions,
    engine: Engine,
    computation: Box<dyn Fn()>,
    /// Every (target, key) pair this effect has been added to.
    deps: RefCell<SmallVec<[DepEdge; 4]>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn record_dep(&self, target: TargetId, key: Key) {
        self.deps.borrow_mut().push(DepEdge { target, key });
    }

    /// Run the computation as the active effect.
    pub(crate) fn run(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }

        let _active = ActiveEffectGuard::enter(self.engine.active_stack(), Rc::clone(self));
        (self.computation)();

        self.run_count.set(self.run_count.get() + 1);
    }
}

/// Handle to a reactive effect.
///
/// Cloning the handle shares the effect. The effect stays registered while
/// any handle is alive.
///
/// # Example
///
/// ```rust
/// use ripple_core::{EffectOptions, Engine};
/// use serde_json::json;
///
/// let engine = Engine::new();
/// let state = engine.reactive(json!({ "count": 0 })).into_observed().unwrap();
///
/// let reader = state.clone();
/// let effect = engine.effect(
///     move || println!("count = {}", reader.get("count")),
///     EffectOptions::default(),
/// );
///
/// state.set("count", 5).unwrap(); // prints "count = 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
#[must_use = "an effect stops running once every handle to it is dropped"]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub(crate) fn new(engine: Engine, computation: Box<dyn Fn()>, options: EffectOptions) -> Self {
        Self {
            inner: Rc::new(EffectInner {
                id: EffectId::next(),
                options,
                engine,
                computation,
                deps: RefCell::new(SmallVec::new()),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<EffectInner> {
        &self.inner
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// The options the effect was created with.
    pub fn options(&self) -> EffectOptions {
        self.inner.options
    }

    /// Run the effect now, tracking its reads.
    ///
    /// The computation returns nothing, because triggered reruns have no
    /// caller to hand a result to. Effects that produce a value write it into
    /// state they capture (a `Cell`, or another wrapper), which is how a
    /// lazy effect backs a derived value: run it on demand, then read what
    /// it stored.
    ///
    /// A panic inside the computation propagates to the caller after the
    /// active-effect stack has been restored.
    pub fn run(&self) {
        self.inner.run();
    }

    /// Retire the effect and remove it from every dependency set.
    ///
    /// After disposal the effect never runs again, whether triggered or
    /// called directly.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let edges = std::mem::take(&mut *self.inner.deps.borrow_mut());
        self.inner.engine.untrack(self.inner.id, &edges);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of (target, key) edges the effect has recorded.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("lazy", &self.inner.options.lazy)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> (Rc<Cell<i32>>, impl Fn() + 'static) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        (count, move || count_clone.set(count_clone.get() + 1))
    }

    #[test]
    fn lazy_effect_hands_results_through_captured_state() {
        let engine = Engine::new();
        let state = engine.reactive(json!({"a": 2})).into_observed().unwrap();
        let doubled = Rc::new(Cell::new(None));

        let sink = doubled.clone();
        let reader = state.clone();
        let effect = engine.effect(
            move || sink.set(reader.get("a").as_number().map(|n| n * 2.0)),
            EffectOptions::lazy(),
        );
        assert_eq!(doubled.get(), None);

        effect.run();
        assert_eq!(doubled.get(), Some(4.0));

        state.set("a", 5).unwrap();
        assert_eq!(doubled.get(), Some(10.0));
    }

    #[test]
    fn effect_runs_on_creation() {
        let engine = Engine::new();
        let (count, bump) = counter();

        let effect = engine.effect(bump, EffectOptions::default());

        assert_eq!(count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let engine = Engine::new();
        let (count, bump) = counter();

        let effect = engine.effect(bump, EffectOptions::lazy());

        assert_eq!(count.get(), 0);
        assert_eq!(effect.run_count(), 0);
        assert!(effect.options().lazy);

        effect.run();
        assert_eq!(count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_ids_increase() {
        let engine = Engine::new();
        let first = engine.effect(|| {}, EffectOptions::lazy());
        let second = engine.effect(|| {}, EffectOptions::lazy());

        assert!(second.id() > first.id());
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let engine = Engine::new();
        let (count, bump) = counter();

        let effect = engine.effect(bump, EffectOptions::default());
        effect.dispose();
        assert!(effect.is_disposed());

        effect.run();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dispose_removes_recorded_edges() {
        let engine = Engine::new();
        let state = engine.reactive(json!({"a": 1, "b": 2})).into_observed().unwrap();
        let target = state.to_raw();

        let reader = state.clone();
        let effect = engine.effect(
            move || {
                reader.get("a");
                reader.get("b");
                reader.get("a");
            },
            EffectOptions::default(),
        );
        assert_eq!(effect.dependency_count(), 2);
        assert_eq!(engine.dependent_count(&target, "a"), 1);

        effect.dispose();
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(engine.dependent_count(&target, "a"), 0);
        assert_eq!(engine.dependent_count(&target, "b"), 0);
    }

    #[test]
    fn effect_clone_shares_state() {
        let engine = Engine::new();
        let effect1 = engine.effect(|| {}, EffectOptions::default());
        let effect2 = effect1.clone();

        assert_eq!(effect1, effect2);
        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect2.dispose();
        assert!(effect1.is_disposed());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EffectOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.lazy);
        let options: EffectOptions = serde_json::from_str(r#"{"lazy": true}"#).unwrap();
        assert_eq!(options, EffectOptions::lazy());
    }
}
