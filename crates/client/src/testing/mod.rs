//! Testing utilities
//!
//! Deterministic clock and in-memory token store. Compiled
//! unconditionally so integration suites and downstream crates can use
//! them without feature juggling; production code only ever touches
//! [`time::SystemClock`].

pub mod mocks;
pub mod time;

pub use mocks::MemoryTokenStore;
pub use time::{Clock, MockClock, SystemClock};
