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

//! Output signal chains applied after the sampler.

use crate::config;

/// Drive gain at full amount.
const MAX_DRIVE_GAIN: f32 = 10.0;

/// Processes output audio in place. Runs on the output stream's thread.
pub trait SignalChain: Send + Sync {
    fn process(&self, buffer: &mut [f32]);

    /// Returns a short name for logging.
    fn name(&self) -> String;
}

/// Leaves the signal untouched.
pub struct Dry;

impl SignalChain for Dry {
    fn process(&self, _buffer: &mut [f32]) {}

    fn name(&self) -> String {
        "dry".to_string()
    }
}

/// A tanh soft clipper blended with the dry signal. An amount of 0 is
/// transparent, and inputs within [-1, 1] stay within [-1, 1].
pub struct Drive {
    amount: f32,
    gain: f32,
    /// Normalizes the clipper so full-scale input maps to full-scale output.
    normalize: f32,
}

impl Drive {
    pub fn new(amount: f32) -> Drive {
        let amount = amount.clamp(0.0, 1.0);
        let gain = 1.0 + (MAX_DRIVE_GAIN - 1.0) * amount;
        Drive {
            amount,
            gain,
            normalize: 1.0 / gain.tanh(),
        }
    }
}

impl SignalChain for Drive {
    fn process(&self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let wet = (self.gain * *sample).tanh() * self.normalize;
            *sample = (1.0 - self.amount) * *sample + self.amount * wet;
        }
    }

    fn name(&self) -> String {
        format!("drive({})", self.amount)
    }
}

/// Builds the chain described by the configuration.
pub fn from_config(config: &config::Effects) -> Box<dyn SignalChain> {
    match config.drive() {
        Some(amount) if amount > 0.0 => Box::new(Drive::new(amount)),
        _ => Box::new(Dry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_is_identity() {
        let mut buffer = vec![0.5, -0.25, 1.0];
        Dry.process(&mut buffer);
        assert_eq!(buffer, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_drive_bounds_and_shape() {
        let drive = Drive::new(0.5);
        let mut buffer: Vec<f32> = (-10..=10).map(|i| i as f32 / 10.0).collect();
        let input = buffer.clone();
        drive.process(&mut buffer);

        for (x, y) in input.iter().zip(buffer.iter()) {
            assert!(y.abs() <= 1.0 + 1e-6);
            // Keeps the sign and never attenuates.
            assert!(y.abs() >= x.abs() - 1e-6);
            assert!(x * y >= 0.0);
        }
        assert!((buffer[20] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_drive_is_transparent() {
        let drive = Drive::new(0.0);
        let mut buffer = vec![0.3, -0.7];
        drive.process(&mut buffer);
        assert!((buffer[0] - 0.3).abs() < 1e-6);
        assert!((buffer[1] + 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_from_config() {
        assert_eq!(from_config(&config::Effects::default()).name(), "dry");
        assert_eq!(
            from_config(&config::Effects::new(Some(0.1))).name(),
            "drive(0.1)"
        );
    }
}
