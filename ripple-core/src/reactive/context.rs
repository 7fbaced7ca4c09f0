//! Active Effect Context
//!
//! The active-effect stack records which effect is currently running. This
//! enables automatic dependency tracking: when a wrapped property is read,
//! the engine registers the effect on top of the stack as a dependent.
//!
//! # Implementation
//!
//! Each engine owns one stack. Running an effect pushes it; the returned
//! guard pops it when dropped, so the previous effect (or none) becomes
//! current again even if the computation panics. Nesting is unbounded: an
//! effect created or triggered inside another simply sits above it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::effect::{EffectId, EffectInner};

/// Stack of running effects. The top entry is the active effect.
#[derive(Default)]
pub(crate) struct ActiveEffectStack {
    stack: RefCell<Vec<Rc<EffectInner>>>,
}

impl ActiveEffectStack {
    /// The effect currently running, if any.
    pub(crate) fn current(&self) -> Option<Rc<EffectInner>> {
        self.stack.borrow().last().cloned()
    }

    pub(crate) fn current_id(&self) -> Option<EffectId> {
        self.stack.borrow().last().map(|effect| effect.id())
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

/// Guard that pops the active effect when dropped.
pub(crate) struct ActiveEffectGuard<'a> {
    stack: &'a ActiveEffectStack,
    effect_id: EffectId,
}

impl<'a> ActiveEffectGuard<'a> {
    /// Make `effect` the active effect until the guard is dropped.
    pub(crate) fn enter(stack: &'a ActiveEffectStack, effect: Rc<EffectInner>) -> Self {
        let effect_id = effect.id();
        stack.stack.borrow_mut().push(effect);
        Self { stack, effect_id }
    }
}

impl Drop for ActiveEffectGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.stack.borrow_mut().pop();

        // Verify we're popping the right effect.
        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "active effect mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
    }
}

/// Counts nested triggers and releases its level when dropped.
pub(crate) struct TriggerDepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> TriggerDepthGuard<'a> {
    /// Enter one trigger level, or return `None` if `limit` levels are
    /// already active.
    pub(crate) fn enter(depth: &'a Cell<usize>, limit: Option<usize>) -> Option<Self> {
        let current = depth.get();
        if limit.is_some_and(|limit| current >= limit) {
            return None;
        }
        depth.set(current + 1);
        Some(Self { depth })
    }
}

impl Drop for TriggerDepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}
