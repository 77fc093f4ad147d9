//! Heart-rate sources feeding the relay.

use crate::core::is_rate_literal;
use std::io::BufRead;

/// Errors from a heart-rate source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The device dropped the connection; the relay reconnects after a pause.
    #[error("Sensor disconnected: {0}")]
    Disconnected(String),
    /// Anything else is not retried.
    #[error("Sensor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A blocking producer of heart-rate readings, one per device tick.
///
/// `next_rate` yields `Ok(Some(0))` for a tick without a reading and
/// `Ok(None)` once the source is exhausted for good.
pub trait HeartRateSource: Send + 'static {
    fn connect(&mut self) -> Result<(), SourceError>;

    fn next_rate(&mut self) -> Result<Option<u32>, SourceError>;
}

/// Reads one integer rate per line, e.g. from a BLE bridge piped to stdin.
///
/// Blank lines are skipped; lines that are not a non-negative integer are
/// logged and skipped.
pub struct LineSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead + Send + 'static> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl LineSource<std::io::BufReader<std::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> HeartRateSource for LineSource<R> {
    fn connect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn next_rate(&mut self) -> Result<Option<u32>, SourceError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !is_rate_literal(trimmed) {
                tracing::warn!("Ignoring malformed rate {:?}", trimmed);
                continue;
            }
            match trimmed.parse::<u32>() {
                Ok(rate) => return Ok(Some(rate)),
                Err(_) => tracing::warn!("Ignoring out-of-range rate {:?}", trimmed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_line_source_parses_rates() {
        let input = "70\n\n  72 \nabc\n-1\n+5\n7.5\n99999999999\n0\n";
        let mut source = LineSource::new(Cursor::new(input));
        source.connect().unwrap();

        let mut rates = Vec::new();
        while let Some(rate) = source.next_rate().unwrap() {
            rates.push(rate);
        }
        assert_eq!(rates, vec![70, 72, 0]);
    }

    #[test]
    fn test_line_source_without_trailing_newline() {
        let mut source = LineSource::new(Cursor::new("65"));
        assert_eq!(source.next_rate().unwrap(), Some(65));
        assert_eq!(source.next_rate().unwrap(), None);
    }
}
