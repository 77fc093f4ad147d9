//! "No signal" detection over the tail of the rolling window.
//!
//! The detector is a pure predicate: it looks at exactly the most recent
//! `threshold` samples (by count, not by time) and reports a panic when
//! every one of them is the zero sentinel. Nothing is latched; every call
//! recomputes from the window it is handed.

use super::sample::StampedRate;
use serde::Serialize;

/// Number of trailing zero samples that constitutes a panic.
pub const DEFAULT_PANIC_THRESHOLD: usize = 20;

/// Result of one panic evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicState {
    Ok,
    Panic,
}

impl PanicState {
    pub fn is_panic(self) -> bool {
        matches!(self, PanicState::Panic)
    }
}

impl From<bool> for PanicState {
    fn from(panic: bool) -> Self {
        if panic {
            PanicState::Panic
        } else {
            PanicState::Ok
        }
    }
}

/// A change between two consecutive evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PanicEvent {
    /// OK → PANIC, raised by the push with the given timestamp
    Started { timestamp: f64 },
    /// PANIC → OK
    Cleared { timestamp: f64 },
}

impl PanicEvent {
    /// Derive the transition between two states, if any.
    pub fn between(previous: PanicState, current: PanicState, timestamp: f64) -> Option<Self> {
        match (previous, current) {
            (PanicState::Ok, PanicState::Panic) => Some(PanicEvent::Started { timestamp }),
            (PanicState::Panic, PanicState::Ok) => Some(PanicEvent::Cleared { timestamp }),
            _ => None,
        }
    }
}

/// Count-based trailing-zero detector.
#[derive(Debug, Clone, Copy)]
pub struct PanicDetector {
    threshold: usize,
}

impl Default for PanicDetector {
    fn default() -> Self {
        Self::new(DEFAULT_PANIC_THRESHOLD)
    }
}

impl PanicDetector {
    /// Create a detector; a threshold of 0 is raised to 1.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Evaluate the window, given in arrival order.
    pub fn evaluate<'a, I>(&self, window: I) -> bool
    where
        I: IntoIterator<Item = &'a StampedRate>,
        I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
    {
        let samples = window.into_iter();
        if samples.len() < self.threshold {
            return false;
        }

        samples
            .rev()
            .take(self.threshold)
            .all(|sample| !sample.has_reading())
    }

    pub fn state<'a, I>(&self, window: I) -> PanicState
    where
        I: IntoIterator<Item = &'a StampedRate>,
        I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
    {
        self.evaluate(window).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(rates: &[u32]) -> Vec<StampedRate> {
        rates
            .iter()
            .enumerate()
            .map(|(i, &rate)| StampedRate::new(i as f64, rate))
            .collect()
    }

    #[test]
    fn test_insufficient_data_is_never_panic() {
        let detector = PanicDetector::default();
        assert!(!detector.evaluate(&samples(&[])));
        assert!(!detector.evaluate(&samples(&[0; 19])));
    }

    #[test]
    fn test_trailing_zeros_trigger_panic() {
        let detector = PanicDetector::default();
        assert!(detector.evaluate(&samples(&[0; 20])));

        let mut rates = vec![72; 100];
        rates.extend([0; 20]);
        assert!(detector.evaluate(&samples(&rates)));
    }

    #[test]
    fn test_single_reading_in_tail_resets() {
        let detector = PanicDetector::default();

        let mut rates = vec![0; 30];
        rates[15] = 64;
        assert!(!detector.evaluate(&samples(&rates)));

        rates.push(0);
        rates.push(65);
        assert!(!detector.evaluate(&samples(&rates)));
    }

    #[test]
    fn test_only_tail_is_inspected() {
        let detector = PanicDetector::new(3);
        // Reading just outside the tail does not matter.
        assert!(detector.evaluate(&samples(&[80, 0, 0, 0])));
        assert!(!detector.evaluate(&samples(&[0, 80, 0, 0])));
    }

    #[test]
    fn test_transitions() {
        assert_eq!(
            PanicEvent::between(PanicState::Ok, PanicState::Panic, 5.0),
            Some(PanicEvent::Started { timestamp: 5.0 })
        );
        assert_eq!(
            PanicEvent::between(PanicState::Panic, PanicState::Ok, 6.0),
            Some(PanicEvent::Cleared { timestamp: 6.0 })
        );
        assert_eq!(PanicEvent::between(PanicState::Ok, PanicState::Ok, 1.0), None);
        assert_eq!(
            PanicEvent::between(PanicState::Panic, PanicState::Panic, 1.0),
            None
        );
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        assert_eq!(PanicDetector::new(0).threshold(), 1);
    }
}
