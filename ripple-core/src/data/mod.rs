//! Data Model
//!
//! The plain data the engine observes: identity-bearing [`Target`]s (objects
//! and arrays), the dynamic [`Value`]s they hold, and the [`Key`]s that
//! address their properties.
//!
//! Nothing in this module tracks or triggers. Raw reads and writes through a
//! `Target` are invisible to effects; only an
//! [`Observed`](crate::reactive::Observed) wrapper takes part in dependency
//! tracking.

mod key;
mod target;
mod value;

pub use key::{Key, LENGTH};
pub use target::{Target, TargetId, MAX_ARRAY_LENGTH};
pub use value::Value;

pub(crate) use target::{array_length, WeakTarget};
