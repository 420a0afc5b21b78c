//! Shared tracing setup for the Upkeep binaries.

mod subscriber;

pub use subscriber::{LogFormat, init, init_with};
