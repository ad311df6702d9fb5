//! Alert rule engine for sensor readings.
//!
//! Rules watch a topic for a value change relative to a comparison value
//! (a constant, or another topic's live reading). Detected edges are run
//! through a trailing-edge debounce with hysteresis: an alert only goes out
//! when the crossing held from the first observation of the quiet window
//! through to the last. Confirmed alerts are delivered via the
//! [`homemon_notify::ChatSink`] seam.

pub mod debounce;
pub mod engine;
pub mod rules;


pub use debounce::{DebounceAccumulator, Observation};
pub use engine::NotifyEngine;
pub use rules::{Compare, Rule, RuleError, RuleStore};
