//! HTTP client pushing samples to the collector.
//!
//! Delivery is at-most-once: a transport failure loses the sample. Callers
//! get a [`PushError`] that tells that case apart from the collector
//! refusing the request, which points at a configuration problem.

use crate::core::StampedRate;
use reqwest::Url;
use std::time::Duration;

const PUSH_PATH: &str = "heartrater/push";

/// Push client errors.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The request never got a response: connection refused, timeout, DNS.
    #[error("Collector unreachable: {0}")]
    Network(#[source] reqwest::Error),
    /// The collector answered with a non-success status.
    #[error("Collector rejected sample ({status})")]
    Rejected { status: u16 },
    #[error("Invalid collector URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl PushError {
    /// Whether this failure is the accepted kind of data loss.
    pub fn is_transient(&self) -> bool {
        matches!(self, PushError::Network(_))
    }
}

/// Client for the collector's push endpoint.
#[derive(Debug, Clone)]
pub struct PushClient {
    push_url: Url,
    token: String,
    client: reqwest::Client,
}

impl PushClient {
    /// Create a new client for the collector at `base_url`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, PushError> {
        let invalid = |reason: String| PushError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let push_url = base.join(PUSH_PATH).map_err(|e| invalid(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(PushError::Client)?;

        Ok(Self {
            push_url,
            token: token.into(),
            client,
        })
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }

    /// Send one sample.
    pub async fn push(&self, sample: StampedRate) -> Result<(), PushError> {
        let timestamp = format!("{:.2}", sample.timestamp);
        let rate = sample.rate.to_string();

        let response = self
            .client
            .get(self.push_url.clone())
            .query(&[
                ("timestamp", timestamp.as_str()),
                ("rate", rate.as_str()),
                ("token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(PushError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
