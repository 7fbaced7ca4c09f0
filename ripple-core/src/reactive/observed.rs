//! Observation Wrappers
//!
//! An [`Observed`] stands in for a [`Target`] and routes every access through
//! the engine: reads call [`Engine::track`], writes call
//! [`Engine::trigger`]. Four modes combine two independent flags:
//!
//! | mode              | reads tracked | writes | nested objects          |
//! |-------------------|---------------|--------|-------------------------|
//! | `Mutable`         | yes           | yes    | wrapped `Mutable`       |
//! | `ShallowMutable`  | yes           | yes    | raw                     |
//! | `Readonly`        | no            | no     | wrapped `Readonly`      |
//! | `ShallowReadonly` | no            | no     | raw                     |
//!
//! Nested objects are wrapped lazily, when they are read, never eagerly when
//! the outer object is wrapped.
//!
//! # Caching
//!
//! Each engine keeps one wrapper per target and mode family (mutable or
//! readonly), for as long as the target is alive. Wrapping the same target
//! twice yields the identical wrapper while any handle to it is held; once
//! every handle is gone the next wrap builds an equivalent wrapper in the
//! same mode. The shallow and deep modes of a family share the cache, so
//! whichever was created first is returned for both.

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::runtime::{Engine, TrackOp, TriggerOp};
use crate::data::{Key, Target, TargetId, Value, WeakTarget};
use crate::error::{ReactiveError, Result};

/// Entries below this count never trigger an automatic sweep.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// How a wrapper observes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Mutable,
    ShallowMutable,
    Readonly,
    ShallowReadonly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        matches!(self, Mode::Readonly | Mode::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::ShallowMutable | Mode::ShallowReadonly)
    }

    /// The mode nested objects are wrapped in when read through a deep
    /// wrapper of this mode.
    fn nested(self) -> Mode {
        if self.is_readonly() {
            Mode::Readonly
        } else {
            Mode::Mutable
        }
    }
}

struct ObservedInner {
    engine: Engine,
    target: Target,
    mode: Mode,
}

/// An observation wrapper around a [`Target`].
///
/// Cloning shares the wrapper; equality is identity.
#[derive(Clone)]
pub struct Observed {
    inner: Rc<ObservedInner>,
}

impl Observed {
    /// Read `key`, tracking it unless the wrapper is readonly.
    ///
    /// Deep wrappers return nested objects wrapped in the matching mode;
    /// shallow wrappers return them raw.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let ObservedInner { engine, target, mode } = &*self.inner;

        let value = target.get(&key);
        if !mode.is_readonly() {
            engine.track(target, TrackOp::Get, &key);
        }
        if mode.is_shallow() || !value.is_object() {
            return value;
        }
        engine.create_reactive_object(value, mode.nested())
    }

    /// Write `key`, rerunning dependents if anything changed.
    ///
    /// A key that did not exist triggers an add; an existing key triggers a
    /// set only when the new value is not strictly equal to the old one.
    /// Readonly wrappers reject the write with
    /// [`ReactiveError::ReadonlyWrite`] and leave the target untouched.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let ObservedInner { engine, target, mode } = &*self.inner;

        if mode.is_readonly() {
            return Err(self.reject_write(key));
        }

        let old_value = target.get(&key);
        let had_key = target.has_own(&key);
        target.set(key.clone(), value.clone())?;

        if !had_key {
            engine.trigger(target, TriggerOp::Add, &key, Some(&value), None)
        } else if !old_value.strict_eq(&value) {
            engine.trigger(target, TriggerOp::Set, &key, Some(&value), Some(&old_value))
        } else {
            Ok(())
        }
    }

    /// Append to an array, returning the new length.
    ///
    /// Writes the next index and then `length`. The index write already
    /// grows the array, so the length write finds nothing changed and length
    /// watchers rerun once.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        if !self.inner.target.is_array() {
            return Err(ReactiveError::NotAnArray);
        }
        let len = self
            .get(Key::length())
            .as_number()
            .map_or(0, |n| n as usize);
        self.set(len, value)?;
        self.set(Key::length(), len + 1)?;
        Ok(len + 1)
    }

    /// Length of the array or number of keys of the object, without
    /// tracking.
    pub fn len(&self) -> usize {
        self.inner.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.target.is_empty()
    }

    pub fn is_array(&self) -> bool {
        self.inner.target.is_array()
    }

    /// The underlying target.
    pub fn to_raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.mode.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.mode.is_shallow()
    }

    /// The engine this wrapper reports to.
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Whether two handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// An untracked JSON snapshot of the target.
    pub fn to_json(&self) -> serde_json::Value {
        self.inner.target.to_json()
    }

    fn reject_write(&self, key: Key) -> ReactiveError {
        let described = self.inner.target.describe();
        if self.inner.engine.config().warn_on_readonly_write {
            warn!(object = %described, %key, "cannot set key on readonly target");
        }
        ReactiveError::ReadonlyWrite {
            target: described,
            key,
        }
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Observed {}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("mode", &self.inner.mode)
            .field("target", &self.inner.target)
            .finish()
    }
}

/// One cached wrapper. The entry lasts as long as its target; the wrapper
/// itself is held weakly and rebuilt in the recorded mode when it was
/// released while the target stayed alive.
struct CacheEntry {
    target: WeakTarget,
    mode: Mode,
    wrapper: Weak<ObservedInner>,
}

/// Wrappers of one mode family, by target.
pub(crate) struct WrapperCache {
    entries: HashMap<TargetId, CacheEntry>,
    sweep_at: usize,
}

impl Default for WrapperCache {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }
}

impl WrapperCache {
    /// The live wrapper for `target`, or the mode its entry was created in.
    fn lookup(&self, target: TargetId) -> Option<std::result::Result<Observed, Mode>> {
        let entry = self.entries.get(&target)?;
        Some(match entry.wrapper.upgrade() {
            Some(inner) => Ok(Observed { inner }),
            None => Err(entry.mode),
        })
    }

    fn insert(&mut self, observed: &Observed) {
        let id = observed.inner.target.id();
        if !self.entries.contains_key(&id) && self.entries.len() >= self.sweep_at {
            self.sweep();
            self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP_THRESHOLD);
        }
        self.entries.insert(
            id,
            CacheEntry {
                target: observed.inner.target.downgrade(),
                mode: observed.inner.mode,
                wrapper: Rc::downgrade(&observed.inner),
            },
        );
    }

    /// Drop entries whose target is gone. Returns how many were removed.
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.target.is_alive());
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Engine {
    /// Wrap `value` for deep, mutable observation.
    ///
    /// Objects come back as [`Value::Observed`]; anything else is returned
    /// unchanged.
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        self.create_reactive_object(value.into(), Mode::Mutable)
    }

    /// Wrap `value` for mutable observation of its top-level keys only.
    pub fn shallow_reactive(&self, value: impl Into<Value>) -> Value {
        self.create_reactive_object(value.into(), Mode::ShallowMutable)
    }

    /// Wrap `value` so that writes are rejected, recursively.
    pub fn readonly(&self, value: impl Into<Value>) -> Value {
        self.create_reactive_object(value.into(), Mode::Readonly)
    }

    /// Wrap `value` so that top-level writes are rejected.
    pub fn shallow_readonly(&self, value: impl Into<Value>) -> Value {
        self.create_reactive_object(value.into(), Mode::ShallowReadonly)
    }

    /// Shared entry point of the four constructors.
    ///
    /// A wrapper already in the requested family (from this engine) is
    /// returned as is. A wrapper from the other family, or from another
    /// engine, is unwrapped and its target wrapped afresh.
    pub(crate) fn create_reactive_object(&self, value: Value, mode: Mode) -> Value {
        let target = match value {
            Value::Object(target) => target,
            Value::Observed(observed) => {
                if observed.is_readonly() == mode.is_readonly() && observed.engine().ptr_eq(self) {
                    return Value::Observed(observed);
                }
                observed.to_raw()
            }
            other => return other,
        };

        let cache = self.wrapper_cache(mode.is_readonly());
        let cached = cache.borrow().lookup(target.id());
        let mode = match cached {
            Some(Ok(observed)) => return Value::Observed(observed),
            Some(Err(first_mode)) => first_mode,
            None => mode,
        };

        let observed = Observed {
            inner: Rc::new(ObservedInner {
                engine: self.clone(),
                target,
                mode,
            }),
        };
        cache.borrow_mut().insert(&observed);
        Value::Observed(observed)
    }

    /// Number of entries across both wrapper caches.
    pub fn cached_wrapper_count(&self) -> usize {
        self.wrapper_cache(false).borrow().len() + self.wrapper_cache(true).borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed(value: Value) -> Observed {
        value.into_observed().expect("object input")
    }

    #[test]
    fn primitives_pass_through() {
        let engine = Engine::new();
        assert_eq!(engine.reactive(1), Value::from(1));
        assert_eq!(engine.readonly("x"), Value::from("x"));
        assert!(engine.shallow_reactive(Value::Null).as_observed().is_none());
    }

    #[test]
    fn wrapping_is_cached_per_family() {
        let engine = Engine::new();
        let target = Target::object();

        let first = observed(engine.reactive(&target));
        let second = observed(engine.reactive(&target));
        let read_only = observed(engine.readonly(&target));

        assert_eq!(first, second);
        assert_ne!(first, read_only);
        assert_eq!(first.mode(), Mode::Mutable);
        assert_eq!(read_only.mode(), Mode::Readonly);
    }

    #[test]
    fn shallow_shares_the_family_cache() {
        let engine = Engine::new();
        let target = Target::object();

        let deep = observed(engine.reactive(&target));
        let shallow = observed(engine.shallow_reactive(&target));
        assert_eq!(deep, shallow);
        assert!(!shallow.is_shallow());
    }

    #[test]
    fn rewrapping_a_wrapper_returns_it() {
        let engine = Engine::new();
        let wrapper = engine.reactive(json!({"a": 1}));
        let again = engine.reactive(wrapper.clone());
        assert_eq!(wrapper, again);
    }

    #[test]
    fn readonly_of_reactive_wraps_the_target() {
        let engine = Engine::new();
        let target = Target::object();
        let mutable = engine.reactive(&target);

        let read_only = observed(engine.readonly(mutable));
        assert!(read_only.is_readonly());
        assert!(read_only.to_raw().ptr_eq(&target));
        assert_eq!(read_only, observed(engine.readonly(&target)));
    }

    #[test]
    fn wrappers_from_another_engine_are_rewrapped() {
        let first = Engine::new();
        let second = Engine::new();
        let target = Target::object();

        let foreign = observed(first.reactive(&target));
        let local = observed(second.reactive(foreign.clone()));
        assert_ne!(foreign, local);
        assert!(local.engine().ptr_eq(&second));
    }

    #[test]
    fn deep_reads_wrap_nested_objects() {
        let engine = Engine::new();
        let state = observed(engine.reactive(json!({"b": {"c": 1}})));
        let nested = observed(state.get("b"));
        assert_eq!(nested.mode(), Mode::Mutable);
        assert_eq!(nested.get("c"), Value::from(1));

        let frozen = observed(engine.readonly(json!({"b": {"c": 1}})));
        assert_eq!(observed(frozen.get("b")).mode(), Mode::Readonly);
    }

    #[test]
    fn shallow_reads_return_raw_objects() {
        let engine = Engine::new();
        let state = observed(engine.shallow_reactive(json!({"b": {"c": 1}})));
        assert!(state.get("b").as_target().is_some());

        let frozen = observed(engine.shallow_readonly(json!({"b": {"c": 1}})));
        assert!(frozen.get("b").as_target().is_some());
    }

    #[test]
    fn writes_through_shallow_wrappers_land() {
        let engine = Engine::new();
        let state = observed(engine.shallow_reactive(json!({"a": 1})));
        state.set("a", 2).unwrap();
        assert_eq!(state.to_json(), json!({"a": 2}));
    }

    #[test]
    fn readonly_rejects_writes() {
        let engine = Engine::new();
        let state = observed(engine.shallow_readonly(json!({"a": 1})));
        let err = state.set("a", 2).unwrap_err();
        assert!(matches!(err, ReactiveError::ReadonlyWrite { ref key, .. } if *key == Key::from("a")));
        assert_eq!(state.get("a"), Value::from(1));
    }

    #[test]
    fn push_requires_an_array() {
        let engine = Engine::new();
        let state = observed(engine.reactive(json!({})));
        assert!(matches!(state.push(1), Err(ReactiveError::NotAnArray)));

        let list = observed(engine.reactive(json!([1])));
        assert_eq!(list.push(2).unwrap(), 2);
        assert_eq!(list.to_json(), json!([1, 2]));
    }

    #[test]
    fn cache_entries_last_as_long_as_the_target() {
        let engine = Engine::new();
        let target = Target::object();
        let wrapper = engine.reactive(&target);
        assert_eq!(engine.cached_wrapper_count(), 1);

        drop(wrapper);
        assert_eq!(engine.sweep(), 0);
        assert_eq!(engine.cached_wrapper_count(), 1);

        drop(target);
        assert_eq!(engine.sweep(), 1);
        assert_eq!(engine.cached_wrapper_count(), 0);
    }

    #[test]
    fn released_wrappers_come_back_in_their_first_mode() {
        let engine = Engine::new();
        let target = Target::object();

        let deep = observed(engine.reactive(&target));
        let shallow = observed(engine.shallow_reactive(&target));
        assert_eq!(shallow.mode(), Mode::Mutable);
        drop((deep, shallow));

        let again = observed(engine.shallow_reactive(&target));
        assert_eq!(again.mode(), Mode::Mutable);
        assert_eq!(again, observed(engine.reactive(&target)));

        let frozen = observed(engine.shallow_readonly(&target));
        drop(frozen);
        assert_eq!(observed(engine.readonly(&target)).mode(), Mode::ShallowReadonly);
    }

    #[test]
    fn mode_serializes_in_snake_case() {
        assert_eq!(serde_json::to_value(Mode::ShallowReadonly).unwrap(), json!("shallow_readonly"));
    }
}
