//! Core functionality of the collector.
//!
//! This module contains:
//! - The timestamped sample type
//! - The rolling window and its shared store
//! - "No signal" panic detection over the window tail

pub mod panic;
pub mod sample;
pub mod store;

// Re-export commonly used types
pub use panic::{PanicDetector, PanicEvent, PanicState, DEFAULT_PANIC_THRESHOLD};
pub use sample::{is_rate_literal, StampedRate};
pub use store::{
    RollingWindow, SampleStore, SharedSampleStore, DEFAULT_CAPACITY, SUBSCRIBER_CAPACITY,
};
