//! Sensor-side relay: reads heart-rate readings and pushes them to the
//! collector.
//!
//! The source runs on a blocking thread and reconnects after
//! [`SourceError::Disconnected`] with a fixed pause. Samples are stamped
//! with wall-clock arrival time and pushed once each; a network failure
//! drops the sample.

pub mod client;
pub mod source;

pub use client::{PushClient, PushError};
pub use source::{HeartRateSource, LineSource, SourceError};

use crate::core::StampedRate;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Relay failures that end the loop.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Sensor reader task failed: {0}")]
    Task(String),
}

/// Counters reported when the relay stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Samples the collector accepted
    pub delivered: u64,
    /// Samples lost to network failures
    pub dropped: u64,
    /// Samples the collector refused
    pub rejected: u64,
    /// Reconnect attempts after a disconnect
    pub reconnects: u64,
}

/// Wall-clock time as fractional epoch seconds.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

/// Run the relay until the source is exhausted or `running` is cleared.
pub async fn run_relay<S: HeartRateSource>(
    source: S,
    client: PushClient,
    retry_delay: Duration,
    running: Arc<AtomicBool>,
) -> Result<RelayStats, RelayError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = tokio::task::spawn_blocking(move || read_loop(source, tx, retry_delay, running));

    let mut stats = RelayStats::default();
    while let Some(sample) = rx.recv().await {
        tracing::info!("Send rate {}", sample.rate);
        match client.push(sample).await {
            Ok(()) => stats.delivered += 1,
            Err(e) if e.is_transient() => {
                tracing::debug!("Sample dropped: {}", e);
                stats.dropped += 1;
            }
            Err(e) => {
                tracing::error!("{}", e);
                stats.rejected += 1;
            }
        }
    }

    stats.reconnects = reader
        .await
        .map_err(|e| RelayError::Task(e.to_string()))??;

    tracing::info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        rejected = stats.rejected,
        "Relay stopped"
    );
    Ok(stats)
}

/// Blocking side: connect, read, reconnect. Returns the reconnect count.
fn read_loop<S: HeartRateSource>(
    mut source: S,
    tx: mpsc::UnboundedSender<StampedRate>,
    retry_delay: Duration,
    running: Arc<AtomicBool>,
) -> Result<u64, SourceError> {
    let mut reconnects = 0;

    while running.load(Ordering::SeqCst) {
        tracing::info!("Connecting to sensor");
        if let Err(e) = source.connect() {
            let SourceError::Disconnected(_) = e else {
                return Err(e);
            };
            tracing::error!(
                "{}. Trying again in {} seconds",
                e,
                retry_delay.as_secs_f32()
            );
            reconnects += 1;
            std::thread::sleep(retry_delay);
            continue;
        }
        tracing::info!("Sensor connected");

        while running.load(Ordering::SeqCst) {
            match source.next_rate() {
                Ok(Some(rate)) => {
                    let sample = StampedRate::new(now_timestamp(), rate);
                    if tx.send(sample).is_err() {
                        return Ok(reconnects);
                    }
                }
                Ok(None) => return Ok(reconnects),
                Err(SourceError::Disconnected(reason)) => {
                    tracing::error!(
                        "Sensor connection lost: {}. Trying again in {} seconds",
                        reason,
                        retry_delay.as_secs_f32()
                    );
                    reconnects += 1;
                    std::thread::sleep(retry_delay);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(reconnects)
}
