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

/// Calculates the root-mean-square level of the given samples.
///
/// Frames are fixed-size and never empty, but an empty slice yields 0.0 rather
/// than NaN so a misbehaving source can only ever read as silence.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sine;

    #[test]
    fn test_rms_of_silence() {
        assert_eq!(rms(&[0.0; 1024]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant() {
        assert!((rms(&[0.5; 256]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.25; 256]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rms_of_sine() {
        // 44100 / 441 gives an exact integer number of periods in the frame.
        let samples = sine(441.0, 0.8, 44100, 4410);
        let expected = 0.8 / std::f32::consts::SQRT_2;
        assert!((rms(&samples) - expected).abs() < 1e-3);
    }
}
