//! Raw Targets
//!
//! A [`Target`] is a plain, unobserved object or array. Reading or writing a
//! target directly never tracks or triggers anything; that is the job of the
//! observation wrappers built on top of it.
//!
//! # Identity
//!
//! Targets are reference types. Cloning a `Target` yields another handle to
//! the same storage, and every target carries a [`TargetId`] that is unique
//! for the lifetime of the process. The dependency store and the wrapper
//! caches key on that id and hold only weak references, so a target that is
//! no longer reachable from user code can be released.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::{Key, Value};
use crate::error::{ReactiveError, Result};

/// Counter for generating unique target IDs.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Largest length an array may be given.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

#[derive(Debug)]
enum RawData {
    Object(IndexMap<Key, Value>),
    Array(Vec<Value>),
}

#[derive(Debug)]
struct TargetCell {
    id: TargetId,
    data: RefCell<RawData>,
}

/// A plain object or array with reference identity.
#[derive(Clone)]
pub struct Target {
    cell: Rc<TargetCell>,
}

/// Weak handle to a [`Target`], held by the engine's bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct WeakTarget(Weak<TargetCell>);

impl WeakTarget {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Target {
    fn with_data(data: RawData) -> Self {
        Self {
            cell: Rc::new(TargetCell {
                id: TargetId::next(),
                data: RefCell::new(data),
            }),
        }
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Self::with_data(RawData::Object(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::with_data(RawData::Array(Vec::new()))
    }

    /// Create an object from key/value pairs, keeping their order.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_data(RawData::Object(map))
    }

    /// Create an array from its elements.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::with_data(RawData::Array(values.into_iter().map(Into::into).collect()))
    }

    /// Build a target from a JSON object or array.
    ///
    /// Nested objects and arrays become targets of their own. Returns `None`
    /// for JSON primitives, which have no identity to observe.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Object(map) => Some(Self::from_entries(map)),
            serde_json::Value::Array(items) => Some(Self::from_values(items)),
            _ => None,
        }
    }

    /// Get the target's unique ID.
    pub fn id(&self) -> TargetId {
        self.cell.id
    }

    /// Whether this target is an array.
    pub fn is_array(&self) -> bool {
        matches!(&*self.cell.data.borrow(), RawData::Array(_))
    }

    /// Number of elements (arrays) or own keys (objects).
    pub fn len(&self) -> usize {
        match &*self.cell.data.borrow() {
            RawData::Object(map) => map.len(),
            RawData::Array(items) => items.len(),
        }
    }

    /// Whether the target has no elements or keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles point at the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn downgrade(&self) -> WeakTarget {
        WeakTarget(Rc::downgrade(&self.cell))
    }

    /// Read a property without tracking. Missing keys read as `Undefined`.
    pub fn get(&self, key: &Key) -> Value {
        match &*self.cell.data.borrow() {
            RawData::Object(map) => map.get(key).cloned().unwrap_or_default(),
            RawData::Array(items) => match key {
                Key::Index(index) => items.get(*index).cloned().unwrap_or_default(),
                key if key.is_length() => Value::from(items.len()),
                Key::Name(_) => Value::Undefined,
            },
        }
    }

    /// Whether the target owns `key`.
    ///
    /// For arrays an index is owned iff it is below the current length, and
    /// `length` is always owned.
    pub fn has_own(&self, key: &Key) -> bool {
        match &*self.cell.data.borrow() {
            RawData::Object(map) => map.contains_key(key),
            RawData::Array(items) => match key {
                Key::Index(index) => *index < items.len(),
                key => key.is_length(),
            },
        }
    }

    /// Own keys in insertion order (indices first, then `length`, for arrays).
    pub fn keys(&self) -> Vec<Key> {
        match &*self.cell.data.borrow() {
            RawData::Object(map) => map.keys().cloned().collect(),
            RawData::Array(items) => (0..items.len())
                .map(Key::Index)
                .chain(std::iter::once(Key::length()))
                .collect(),
        }
    }

    /// Write a property without triggering.
    ///
    /// Arrays grow with `undefined` holes when an index past the end is
    /// written, and truncate or grow when `length` is written. Indices must
    /// stay below [`MAX_ARRAY_LENGTH`].
    pub fn set(&self, key: Key, value: Value) -> Result<()> {
        let is_array = self.is_array();
        if let Key::Index(index) = key {
            if is_array && index >= MAX_ARRAY_LENGTH {
                return Err(ReactiveError::IndexOutOfRange { index });
            }
        }

        // Validated before borrowing: rendering the value may read this target.
        let new_len = if key.is_length() && is_array {
            let len = array_length(&value)
                .ok_or_else(|| ReactiveError::InvalidArrayLength(value.to_string()))?;
            Some(len)
        } else {
            None
        };

        let mut data = self.cell.data.borrow_mut();
        match &mut *data {
            RawData::Object(map) => {
                map.insert(key, value);
            }
            RawData::Array(items) => match (key, new_len) {
                (_, Some(len)) => items.resize(len, Value::Undefined),
                (Key::Index(index), None) => {
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                (key, None) => return Err(ReactiveError::UnsupportedKey { key }),
            },
        }
        Ok(())
    }

    /// A JSON snapshot of the target. Cycles are cut with `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// One-line JSON rendering, used in diagnostics.
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Interpret a value as an array length.
pub(crate) fn array_length(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_ARRAY_LENGTH as f64 => {
            Some(*n as usize)
        }
        _ => None,
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("kind", &if self.is_array() { "array" } else { "object" })
            .field("len", &self.len())
            .finish()
    }
}

thread_local! {
    /// Targets currently being serialized on this thread.
    static SERIALIZING: RefCell<HashSet<TargetId>> = RefCell::new(HashSet::new());
}

/// Removes a target from the in-progress set when serialization unwinds.
struct SerializeGuard(TargetId);

impl Drop for SerializeGuard {
    fn drop(&mut self) {
        SERIALIZING.with(|set| {
            set.borrow_mut().remove(&self.0);
        });
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fresh = SERIALIZING.with(|set| set.borrow_mut().insert(self.id()));
        if !fresh {
            return serializer.serialize_str("[Circular]");
        }
        let _guard = SerializeGuard(self.id());

        let data = self.cell.data.borrow();
        match &*data {
            RawData::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(&key.to_string(), value)?;
                }
                out.end()
            }
            RawData::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for value in items {
                    out.serialize_element(value)?;
                }
                out.end()
            }
        }
    }
}
