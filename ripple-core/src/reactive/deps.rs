//! Dependency Store
//!
//! Maps each observed target to the effects that read each of its keys:
//!
//! ```text
//! TargetId -> { key -> [effect, effect, ...] }
//! ```
//!
//! Both inner levels keep insertion order, which fixes the order in which a
//! trigger reruns effects. Effect sets are keyed by [`EffectId`], so an effect
//! appears at most once per key however often it reads that key.
//!
//! The store holds only weak references, to targets and to effects alike.
//! Dead effects are pruned whenever a set is collected for a trigger; dead
//! targets are removed by [`DependencyStore::sweep`].

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::effect::{EffectId, EffectInner};
use crate::data::{Key, Target, TargetId, WeakTarget};

/// Entries below this count never trigger an automatic sweep.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// Effects that depend on one key, in insertion order.
pub(crate) type EffectSet = IndexMap<EffectId, Weak<EffectInner>>;

/// Everything tracked on one target.
pub(crate) struct TargetDeps {
    target: WeakTarget,
    keys: IndexMap<Key, EffectSet>,
}

impl TargetDeps {
    pub(crate) fn keys_mut(&mut self) -> impl Iterator<Item = (&Key, &mut EffectSet)> {
        self.keys.iter_mut()
    }

    pub(crate) fn get_mut(&mut self, key: &Key) -> Option<&mut EffectSet> {
        self.keys.get_mut(key)
    }
}

pub(crate) struct DependencyStore {
    targets: HashMap<TargetId, TargetDeps>,
    sweep_at: usize,
}

impl Default for DependencyStore {
    fn default() -> Self {
        Self {
            targets: HashMap::new(),
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }
}

impl DependencyStore {
    /// Add `effect` to the set for `(target, key)`, creating the entries as
    /// needed. Returns `true` if the effect was not already in the set.
    pub(crate) fn insert(&mut self, target: &Target, key: &Key, effect: &Rc<EffectInner>) -> bool {
        if !self.targets.contains_key(&target.id()) {
            self.maybe_sweep();
        }

        let entry = self.targets.entry(target.id()).or_insert_with(|| TargetDeps {
            target: target.downgrade(),
            keys: IndexMap::new(),
        });
        let set = entry.keys.entry(key.clone()).or_default();
        if set.contains_key(&effect.id()) {
            return false;
        }
        set.insert(effect.id(), Rc::downgrade(effect));
        true
    }

    pub(crate) fn get_mut(&mut self, target: TargetId) -> Option<&mut TargetDeps> {
        self.targets.get_mut(&target)
    }

    /// Remove one effect from one key's set.
    pub(crate) fn remove(&mut self, target: TargetId, key: &Key, effect: EffectId) {
        if let Some(entry) = self.targets.get_mut(&target) {
            if let Some(set) = entry.keys.get_mut(key) {
                set.shift_remove(&effect);
            }
        }
    }

    /// Number of live effects depending on `(target, key)`.
    pub(crate) fn dependent_count(&self, target: TargetId, key: &Key) -> usize {
        self.targets
            .get(&target)
            .and_then(|entry| entry.keys.get(key))
            .map_or(0, |set| set.values().filter(|e| e.strong_count() > 0).count())
    }

    /// Number of targets with at least one entry.
    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    /// Drop entries for dead targets and prune dead effects from the rest.
    /// Returns the number of targets removed.
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, entry| {
            if !entry.target.is_alive() {
                return false;
            }
            entry.keys.retain(|_, set| {
                set.retain(|_, effect| effect.strong_count() > 0);
                !set.is_empty()
            });
            !entry.keys.is_empty()
        });
        before - self.targets.len()
    }

    fn maybe_sweep(&mut self) {
        if self.targets.len() < self.sweep_at {
            return;
        }
        self.sweep();
        self.sweep_at = (self.targets.len() * 2).max(MIN_SWEEP_THRESHOLD);
    }
}

/// Add the live members of `set` to `collected`, pruning dead ones.
pub(crate) fn collect_live(set: &mut EffectSet, collected: &mut IndexMap<EffectId, Rc<EffectInner>>) {
    set.retain(|_, effect| effect.strong_count() > 0);
    for (id, effect) in set.iter() {
        if let Some(effect) = effect.upgrade() {
            collected.entry(*id).or_insert(effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{EffectOptions, Engine};

    #[test]
    fn insert_is_idempotent() {
        let engine = Engine::new();
        let effect = engine.effect(|| {}, EffectOptions::lazy());
        let target = Target::object();
        let key = Key::from("a");
        let mut store = DependencyStore::default();

        assert!(store.insert(&target, &key, effect.inner()));
        assert!(!store.insert(&target, &key, effect.inner()));
        assert_eq!(store.dependent_count(target.id(), &key), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_drops_membership() {
        let engine = Engine::new();
        let effect = engine.effect(|| {}, EffectOptions::lazy());
        let target = Target::object();
        let key = Key::from("a");
        let mut store = DependencyStore::default();

        store.insert(&target, &key, effect.inner());
        store.remove(target.id(), &key, effect.id());
        assert_eq!(store.dependent_count(target.id(), &key), 0);
    }

    #[test]
    fn dead_effects_are_not_counted_or_collected() {
        let engine = Engine::new();
        let effect = engine.effect(|| {}, EffectOptions::lazy());
        let target = Target::object();
        let key = Key::from("a");
        let mut store = DependencyStore::default();

        store.insert(&target, &key, effect.inner());
        drop(effect);
        assert_eq!(store.dependent_count(target.id(), &key), 0);

        let mut collected = IndexMap::new();
        let set = store.get_mut(target.id()).unwrap().get_mut(&key).unwrap();
        collect_live(set, &mut collected);
        assert!(collected.is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn sweep_removes_dead_targets() {
        let engine = Engine::new();
        let effect = engine.effect(|| {}, EffectOptions::lazy());
        let kept = Target::object();
        let dropped = Target::object();
        let mut store = DependencyStore::default();

        store.insert(&kept, &Key::from("a"), effect.inner());
        store.insert(&dropped, &Key::from("a"), effect.inner());
        drop(dropped);

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.dependent_count(kept.id(), &Key::from("a")), 1);
    }

    #[test]
    fn collected_effects_keep_insertion_order() {
        let engine = Engine::new();
        let first = engine.effect(|| {}, EffectOptions::lazy());
        let second = engine.effect(|| {}, EffectOptions::lazy());
        let target = Target::object();
        let mut store = DependencyStore::default();

        store.insert(&target, &Key::from("b"), second.inner());
        store.insert(&target, &Key::from("a"), first.inner());
        store.insert(&target, &Key::from("a"), second.inner());

        let mut collected = IndexMap::new();
        let entry = store.get_mut(target.id()).unwrap();
        for (_, set) in entry.keys_mut() {
            collect_live(set, &mut collected);
        }
        let order: Vec<_> = collected.keys().copied().collect();
        assert_eq!(order, vec![second.id(), first.id()]);
    }
}
