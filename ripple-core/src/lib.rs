//! Ripple Core
//!
//! This crate provides the dependency-tracking engine underneath the Ripple
//! reactive toolkit. It implements:
//!
//! - Observation wrappers over plain objects and arrays (deep or shallow,
//!   mutable or readonly)
//! - Effects that rerun when the wrapped properties they read are written
//! - The track/trigger protocol connecting the two
//!
//! Higher-level primitives (computed values, refs, render schedulers) are
//! expected to be built on [`Engine::effect`], [`Engine::track`] and
//! [`Engine::trigger`].
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `data`: Targets, values and keys, the plain data being observed
//! - `reactive`: Effects, the dependency store and observation wrappers
//! - `config`: Engine configuration
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use ripple_core::{EffectOptions, Engine};
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! let state = engine.reactive(json!({ "count": 1 })).into_observed().unwrap();
//!
//! // Create an effect that reads `count`
//! let doubled = Rc::new(Cell::new(0.0));
//! let sink = doubled.clone();
//! let reader = state.clone();
//! let _effect = engine.effect(
//!     move || sink.set(reader.get("count").as_number().unwrap_or(0.0) * 2.0),
//!     EffectOptions::default(),
//! );
//! assert_eq!(doubled.get(), 2.0);
//!
//! // Writing `count` reruns the effect before `set` returns
//! state.set("count", 5).unwrap();
//! assert_eq!(doubled.get(), 10.0);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod reactive;

pub use config::EngineConfig;
pub use data::{Key, Target, TargetId, Value};
pub use error::{ReactiveError, Result};
pub use reactive::{
    default_engine, effect, reactive, readonly, shallow_reactive, shallow_readonly, Effect,
    EffectId, EffectOptions, Engine, Mode, Observed, TrackOp, TriggerOp,
};
