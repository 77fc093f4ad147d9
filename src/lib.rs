//! Heartrater - heart-rate collector for a single wearable.
//!
//! A relay pushes periodic heart-rate samples to the collector, which keeps
//! the most recent ones in memory, watches for a run of "no reading"
//! samples, and renders the window as a chart for chat-bot consumers.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  push   ┌─────────────────────────────────────────┐
//! │   Relay    │────────▶│               Collector                 │
//! │ (sensor)   │         │  ┌─────────────┐    ┌───────────────┐   │
//! └────────────┘         │  │ SampleStore │───▶│ PanicDetector │   │
//!                        │  │  (360 FIFO) │    │ (last 20 = 0) │   │
//! ┌────────────┐  plot   │  └─────────────┘    └───────────────┘   │
//! │  Chat bot  │◀────────│         │ snapshot                      │
//! └────────────┘         │         ▼                               │
//!                        │  ┌───────────────┐                      │
//!                        │  │ ChartRenderer │──▶ PNG               │
//!                        │  └───────────────┘                      │
//!                        └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use heartrater::{ChartRenderer, SampleStore};
//!
//! let store = SampleStore::default();
//! store.push(100.0, 70);
//! store.push(101.0, 72);
//! store.push(102.0, 0);
//!
//! assert!(!store.panic_state().is_panic());
//! let png = ChartRenderer::new().build(&store.snapshot()).unwrap();
//! assert!(png.starts_with(b"\x89PNG"));
//! ```

pub mod chart;
pub mod config;
pub mod core;

#[cfg(feature = "relay")]
pub mod relay;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use chart::{ChartRenderer, LabelTimezone, RenderError};
pub use config::{Config, ConfigError};
pub use core::{
    PanicDetector, PanicEvent, PanicState, RollingWindow, SampleStore, SharedSampleStore,
    StampedRate,
};

#[cfg(feature = "relay")]
pub use relay::{run_relay, HeartRateSource, LineSource, PushClient, PushError, RelayStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
