// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Fundamental frequency estimation using the Average Magnitude Difference Function.
//!
//! For every candidate lag in `[min_lag, N/2)` the frame is compared against
//! itself shifted by that lag over the first `N/2` samples. The scan costs
//! `O(N/2 * (N/2 - min_lag))` per frame, roughly 240k additions for a 1024
//! sample frame, which has to fit inside a single scheduler tick since the loop
//! has no backpressure.

use crate::audio::AudioFrame;

/// Tunables for the pitch estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchConfig {
    /// The smallest lag considered. Bounds the highest detectable frequency
    /// to `sample_rate / min_lag`.
    pub min_lag: usize,
    /// A lag is accepted only if its difference is below this ratio of the
    /// smallest difference seen before its own dip.
    pub confidence_ratio: f32,
    /// A frame is rejected unless its deepest dip is below this ratio of the
    /// mean difference. Silence, DC and broadband noise all fail this.
    pub max_dip_ratio: f32,
    /// Dips within this fraction of (mean - minimum) above the global minimum
    /// compete for the period, and the shortest lag among them wins.
    pub octave_tolerance: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        PitchConfig {
            min_lag: 50,
            confidence_ratio: 0.9,
            max_dip_ratio: 0.5,
            octave_tolerance: 0.1,
        }
    }
}

/// Estimates the fundamental frequency of audio frames.
pub struct PitchEstimator {
    config: PitchConfig,
    /// Difference per lag, reused between frames. Index 0 is `min_lag`.
    differences: Vec<f32>,
}

impl PitchEstimator {
    /// Creates a new pitch estimator.
    pub fn new(config: PitchConfig) -> PitchEstimator {
        PitchEstimator {
            config,
            differences: Vec::new(),
        }
    }

    /// Returns the estimator configuration.
    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    /// Estimates the fundamental frequency of the frame in Hz, or None if no lag
    /// stands out clearly enough to call the frame pitched.
    pub fn estimate(&mut self, frame: &AudioFrame) -> Option<f32> {
        let samples = frame.samples();
        let window = samples.len() / 2;
        let min_lag = self.config.min_lag.max(1);

        // At least three lags are needed to find an interior dip.
        if window < min_lag + 3 {
            return None;
        }

        self.differences.clear();
        for lag in min_lag..window {
            let sum: f32 = samples[..window]
                .iter()
                .zip(&samples[lag..lag + window])
                .map(|(a, b)| (a - b).abs())
                .sum();
            self.differences.push(sum / window as f32);
        }

        let differences = &self.differences;
        let (global_index, global_min) = differences
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::INFINITY), |best, (i, d)| {
                if d < best.1 {
                    (i, d)
                } else {
                    best
                }
            });
        let mean = differences.iter().sum::<f32>() / differences.len() as f32;

        if !mean.is_finite() || mean <= 0.0 || global_min >= self.config.max_dip_ratio * mean {
            return None;
        }

        // A later multiple of a non-integer period can line up slightly better
        // than the period itself, so take the first dip that is nearly as deep.
        let threshold = global_min + self.config.octave_tolerance * (mean - global_min);
        let best = (1..differences.len() - 1)
            .find(|&i| {
                differences[i] <= threshold
                    && differences[i] <= differences[i - 1]
                    && differences[i] <= differences[i + 1]
            })
            .unwrap_or(global_index);

        // Only dips before the accepted one compete. The slope running down
        // into it belongs to the same dip, and with a period near x.5 its
        // neighbouring lag is almost as deep.
        let mut valley = best;
        while valley > 0 && differences[valley - 1] >= differences[valley] {
            valley -= 1;
        }
        let second_best = differences[..valley]
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);
        // Nothing before the dip means nothing to compete with.
        if differences[best] >= self.config.confidence_ratio * second_best {
            return None;
        }

        let lag = (min_lag + best) as f32 + self.interpolate(best);
        Some(frame.sample_rate() as f32 / lag)
    }

    /// Fits a parabola through the dip and its neighbours and returns the offset
    /// of its vertex, in lags, relative to the dip.
    fn interpolate(&self, index: usize) -> f32 {
        if index == 0 || index + 1 >= self.differences.len() {
            return 0.0;
        }

        let before = self.differences[index - 1];
        let at = self.differences[index];
        let after = self.differences[index + 1];
        let curvature = before - 2.0 * at + after;
        if curvature <= f32::EPSILON {
            return 0.0;
        }

        (0.5 * (before - after) / curvature).clamp(-0.5, 0.5)
    }
}

impl std::fmt::Debug for PitchEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchEstimator")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{noise, sine};

    const FRAME_SIZE: usize = 1024;

    fn estimate(samples: Vec<f32>, sample_rate: u32) -> Option<f32> {
        let mut estimator = PitchEstimator::new(PitchConfig::default());
        estimator.estimate(&AudioFrame::new(samples, sample_rate))
    }

    fn assert_close(frequency: f32, sample_rate: u32) {
        let detected = estimate(sine(frequency, 0.5, sample_rate, FRAME_SIZE), sample_rate)
            .unwrap_or_else(|| panic!("no pitch found for {} Hz", frequency));
        let error = (detected - frequency).abs() / frequency;
        assert!(
            error <= 0.01,
            "expected {} Hz at {} Hz sample rate, got {}",
            frequency,
            sample_rate,
            detected
        );
    }

    #[test]
    fn test_detect_a440() {
        assert_close(440.0, 44100);
        assert_close(440.0, 48000);
    }

    #[test]
    fn test_detect_across_band() {
        // Every period from 2 * min_lag up to N/2, in steps that hit whole,
        // quarter and half sample periods.
        for sample_rate in [44100, 48000] {
            let mut failures = Vec::new();
            for step in 0..=548 {
                let period = 100.0 + step as f32 * 0.75;
                let frequency = sample_rate as f32 / period;
                let amplitude = if step % 2 == 0 { 0.5 } else { 0.05 };
                let detected = estimate(
                    sine(frequency, amplitude, sample_rate, FRAME_SIZE),
                    sample_rate,
                );
                match detected {
                    Some(detected) if (detected - frequency).abs() / frequency <= 0.01 => {}
                    _ => failures.push((frequency, detected)),
                }
            }
            assert!(
                failures.is_empty(),
                "{} misses at {} Hz sample rate: {:?}",
                failures.len(),
                sample_rate,
                failures
            );
        }
    }

    #[test]
    fn test_detect_half_sample_periods() {
        for frequency in [92.35, 103.4, 110.11, 115.29, 120.0, 143.4, 166.1] {
            assert_close(frequency, 44100);
        }
    }

    #[test]
    fn test_detect_period_at_min_lag() {
        // A period of exactly min_lag with the scan ending before the next
        // dip, so the only dip sits on the first scanned lag.
        let config = PitchConfig {
            min_lag: 100,
            ..Default::default()
        };
        let mut estimator = PitchEstimator::new(config);
        let detected = estimator
            .estimate(&AudioFrame::new(sine(441.0, 0.5, 44100, 380), 44100))
            .unwrap();
        assert!((detected - 441.0).abs() / 441.0 <= 0.01, "got {}", detected);
    }

    #[test]
    fn test_no_subharmonic_errors() {
        // 110 Hz at 44.1kHz has a period of 400.9 samples, which lines up with
        // lag 401 better than 220 Hz lines up with lag 200. The estimator has to
        // report the fundamental of the 220 Hz tone, not an octave below it.
        let detected = estimate(sine(220.0, 0.5, 44100, FRAME_SIZE), 44100).unwrap();
        assert!((detected - 220.0).abs() < 2.2, "got {}", detected);
    }

    #[test]
    fn test_detection_is_level_independent() {
        let quiet = estimate(sine(440.0, 0.01, 44100, FRAME_SIZE), 44100).unwrap();
        let loud = estimate(sine(440.0, 0.9, 44100, FRAME_SIZE), 44100).unwrap();
        assert!((quiet - loud).abs() < 0.5);
    }

    #[test]
    fn test_silence_has_no_pitch() {
        assert_eq!(estimate(vec![0.0; FRAME_SIZE], 44100), None);
        assert_eq!(estimate(vec![0.3; FRAME_SIZE], 44100), None);
    }

    #[test]
    fn test_noise_has_no_pitch() {
        for seed in 0..8 {
            assert_eq!(estimate(noise(0.5, FRAME_SIZE, seed), 44100), None);
        }
    }

    #[test]
    fn test_short_frame_has_no_pitch() {
        assert_eq!(estimate(sine(440.0, 0.5, 44100, 100), 44100), None);
    }

    #[test]
    fn test_harmonic_tone() {
        // Fundamental with a strong second harmonic, roughly a sung vowel.
        let sample_rate = 44100;
        let fundamental = sine(196.0, 0.4, sample_rate, FRAME_SIZE);
        let harmonic = sine(392.0, 0.3, sample_rate, FRAME_SIZE);
        let samples: Vec<f32> = fundamental
            .iter()
            .zip(harmonic.iter())
            .map(|(a, b)| a + b)
            .collect();

        let detected = estimate(samples, sample_rate).unwrap();
        assert!((detected - 196.0).abs() / 196.0 <= 0.01, "got {}", detected);
    }
}
