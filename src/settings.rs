//! Component settings: storage and the readiness gate.

pub mod readiness;
pub mod store;


pub use readiness::{ReadinessGate, ReadinessState, ReadinessTransition};
pub use store::{MemoryStore, SettingsStore};
