//! Major tick placement for the chart axes.

/// Mantissas tried for linear axes, per decade.
const LINEAR_STEPS: [f64; 5] = [1.0, 2.0, 2.5, 5.0, 10.0];

/// Candidate spacings for time axes, in seconds. Labels are `HH:MM`, so
/// nothing finer than a minute is offered.
const TIME_STEPS: [f64; 13] = [
    60.0, 120.0, 300.0, 600.0, 900.0, 1200.0, 1800.0, 3600.0, 7200.0, 10800.0, 21600.0, 43200.0,
    86400.0,
];

const SECONDS_PER_DAY: f64 = 86400.0;

/// Evenly spaced "nice" values inside `[min, max]`, at most `max_ticks` of them.
pub fn linear_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<f64> {
    if max_ticks == 0 || !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    if max <= min {
        return vec![min];
    }

    let raw_step = (max - min) / max_ticks as f64;
    let mut magnitude = 10f64.powf(raw_step.log10().floor());

    for _ in 0..4 {
        for mantissa in LINEAR_STEPS {
            if let Some(ticks) = ticks_for_step(min, max, mantissa * magnitude, 0.0, max_ticks) {
                return ticks;
            }
        }
        magnitude *= 10.0;
    }

    vec![min]
}

/// Tick positions (epoch seconds) aligned to whole minutes/hours of a
/// timezone that is `utc_offset` seconds ahead of UTC.
pub fn time_ticks(min: f64, max: f64, max_ticks: usize, utc_offset: i32) -> Vec<f64> {
    if max_ticks == 0 || !min.is_finite() || !max.is_finite() || max < min {
        return Vec::new();
    }

    let offset = f64::from(utc_offset);
    for step in TIME_STEPS {
        if let Some(ticks) = ticks_for_step(min, max, step, offset, max_ticks) {
            return ticks;
        }
    }

    // Spans of several days: whole-day multiples.
    let days = ((max - min) / SECONDS_PER_DAY / max_ticks as f64).ceil().max(1.0);
    ticks_for_step(min, max, days * SECONDS_PER_DAY, offset, max_ticks).unwrap_or_default()
}

/// Multiples of `step` (shifted by `-offset`) that fall inside `[min, max]`,
/// or `None` when there would be more than `limit` of them.
fn ticks_for_step(min: f64, max: f64, step: f64, offset: f64, limit: usize) -> Option<Vec<f64>> {
    if step <= 0.0 || !step.is_finite() {
        return None;
    }

    let tolerance = step * 1e-9;
    let first = ((min + offset - tolerance) / step).ceil();
    let last = ((max + offset + tolerance) / step).floor();
    let count = if last < first {
        0
    } else {
        (last - first) as usize + 1
    };
    if count > limit {
        return None;
    }

    Some(
        (0..count)
            .map(|i| (first + i as f64) * step - offset)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_ticks_heart_rate_range() {
        let ticks = linear_ticks(58.0, 102.0, 4);
        // Step 10 would give five ticks, so 20 is chosen.
        assert_eq!(ticks, vec![60.0, 80.0, 100.0]);
    }

    #[test]
    fn test_linear_ticks_never_exceed_limit() {
        for (min, max) in [(0.0, 1.0), (61.0, 62.0), (40.0, 190.0), (0.0, 1e6), (70.5, 70.9)] {
            let ticks = linear_ticks(min, max, 4);
            assert!(!ticks.is_empty(), "no ticks for {min}..{max}");
            assert!(ticks.len() <= 4, "{ticks:?}");
            assert!(ticks.iter().all(|t| *t >= min - 1e-9 && *t <= max + 1e-9));
        }
    }

    #[test]
    fn test_linear_ticks_degenerate_range() {
        assert_eq!(linear_ticks(70.0, 70.0, 4), vec![70.0]);
        assert!(linear_ticks(f64::NAN, 1.0, 4).is_empty());
        assert!(linear_ticks(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_time_ticks_align_to_minutes() {
        // 10:00:30 .. 10:06:00 UTC on 1970-01-01
        let ticks = time_ticks(36030.0, 36360.0, 4, 0);
        assert_eq!(ticks, vec![36120.0, 36240.0, 36360.0]);
    }

    #[test]
    fn test_time_ticks_respect_offset() {
        // Half-hour offset: hourly ticks land on local whole hours.
        let ticks = time_ticks(0.0, 4.0 * 3600.0, 4, 1800);
        assert_eq!(ticks, vec![1800.0, 5400.0, 9000.0, 12600.0]);
    }

    #[test]
    fn test_time_ticks_long_span() {
        let ticks = time_ticks(0.0, 30.0 * SECONDS_PER_DAY, 4, 0);
        assert!(!ticks.is_empty());
        assert!(ticks.len() <= 4);
    }
}
