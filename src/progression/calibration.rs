//! Calibration aggregation: turns 20 step samples into a starting band.
//!
//! Per band `b`: `rate(b) = Σ error_count / Σ phoneme_count` over the samples
//! whose step maps to `b`.  The suggested level is the highest band such that
//! it and every band below it have `rate ≤ max_error_rate`.  A band without
//! samples fails.  When the bottom band already fails the suggestion is the
//! bottom band.

use crate::progression::level::{band_index, DifficultyLevel};
use crate::progression::state::CalibrationSample;

/// Aggregate error rate per band, `None` for bands without samples.
pub fn band_error_rates(samples: &[CalibrationSample]) -> [Option<f64>; 4] {
    let mut errors = [0usize; 4];
    let mut phonemes = [0usize; 4];
    let mut seen = [false; 4];

    for sample in samples {
        let band = band_index(sample.step);
        errors[band] += sample.error_count;
        phonemes[band] += sample.phoneme_count;
        seen[band] = true;
    }

    let mut rates = [None; 4];
    for band in 0..4 {
        if seen[band] {
            rates[band] = Some(errors[band] as f64 / phonemes[band].max(1) as f64);
        }
    }
    rates
}

/// Starting band for a learner who finished calibration.
pub fn suggest_level(samples: &[CalibrationSample], max_error_rate: f64) -> DifficultyLevel {
    let rates = band_error_rates(samples);

    let passed = rates
        .iter()
        .take_while(|rate| matches!(rate, Some(r) if *r <= max_error_rate))
        .count();

    DifficultyLevel::from_index(passed.saturating_sub(1)).unwrap_or(DifficultyLevel::BOTTOM)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// 20 samples of 4 phonemes each, with per-band error counts per step.
    fn samples(errors_per_band: [usize; 4]) -> Vec<CalibrationSample> {
        (1..=20u8)
            .map(|step| CalibrationSample {
                step,
                error_count: errors_per_band[band_index(step)],
                phoneme_count: 4,
            })
            .collect()
    }

    #[test]
    fn perfect_calibration_suggests_top_band() {
        assert_eq!(suggest_level(&samples([0, 0, 0, 0]), 0.25), DifficultyLevel::Advanced);
    }

    #[test]
    fn failing_everything_suggests_bottom_band() {
        assert_eq!(suggest_level(&samples([4, 4, 4, 4]), 0.25), DifficultyLevel::Beginner);
    }

    #[test]
    fn highest_contiguous_passing_band_wins() {
        // rates: 0.0, 0.25, 0.5, 0.0 -> band 2 fails, band 3 is ignored
        assert_eq!(
            suggest_level(&samples([0, 1, 2, 0]), 0.25),
            DifficultyLevel::Elementary
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(suggest_level(&samples([1, 1, 1, 1]), 0.25), DifficultyLevel::Advanced);
        assert_eq!(suggest_level(&samples([1, 1, 1, 1]), 0.2), DifficultyLevel::Beginner);
    }

    #[test]
    fn missing_band_counts_as_failing() {
        let partial: Vec<_> = samples([0, 0, 0, 0])
            .into_iter()
            .filter(|s| band_index(s.step) != 1)
            .collect();
        assert_eq!(suggest_level(&partial, 0.25), DifficultyLevel::Beginner);
    }

    #[test]
    fn band_rates_aggregate_phonemes_not_attempts() {
        let s = vec![
            CalibrationSample { step: 1, error_count: 1, phoneme_count: 2 },
            CalibrationSample { step: 2, error_count: 0, phoneme_count: 8 },
        ];
        let rates = band_error_rates(&s);
        assert_eq!(rates[0], Some(0.1));
        assert_eq!(rates[1], None);
    }
}
