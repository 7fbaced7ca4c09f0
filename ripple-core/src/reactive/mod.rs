//! Reactive Core
//!
//! This module implements the tracking engine: effects, the dependency store,
//! the track/trigger protocol and the observation wrappers.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An [`Effect`] wraps a computation. While it runs, every property it reads
//! through a mutable wrapper is recorded as one of its dependencies. Writing
//! one of those properties later reruns it, synchronously.
//!
//! ## Observation Wrappers
//!
//! An [`Observed`] wrapper stands in for a plain [`Target`](crate::Target).
//! Reads through it track, writes through it trigger. Wrappers come in four
//! [`Mode`]s: deep or shallow, mutable or readonly.
//!
//! ## Engines
//!
//! An [`Engine`] owns all bookkeeping: the dependency store, the active
//! effect stack and the wrapper caches. Engines are fully independent of
//! each other. The free functions ([`reactive()`], [`effect()`], ...) use a
//! per-thread default engine.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded and synchronous. A trigger reruns its
//! effects before the write that caused it returns, so an effect that writes
//! recurses into further triggers. A configurable depth guard stops runaway
//! recursion; see [`EngineConfig`](crate::EngineConfig).

mod context;
mod deps;
mod effect;
mod global;
mod observed;
mod runtime;

pub use effect::{Effect, EffectId, EffectOptions};
pub use global::{default_engine, effect, reactive, readonly, shallow_reactive, shallow_readonly};
pub use observed::{Mode, Observed};
pub use runtime::{Engine, TrackOp, TriggerOp};
