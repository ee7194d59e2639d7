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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::tracker::{PitchConfig, TriggerConfig};

/// Default scheduling interval, roughly one display refresh.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// A YAML representation of the pitch tracker configuration. Every field is
/// optional and falls back to the tracker's defaults.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Tracker {
    min_lag: Option<usize>,
    confidence_ratio: Option<f32>,
    max_dip_ratio: Option<f32>,
    octave_tolerance: Option<f32>,
    attack_threshold: Option<f32>,
    release_threshold: Option<f32>,
    velocity: Option<f32>,
    epic_velocity: Option<f32>,
    confirm_ticks: Option<u32>,
    tick_interval: Option<String>,
}

impl Tracker {
    /// Returns the pitch estimator configuration.
    pub fn pitch(&self) -> PitchConfig {
        let defaults = PitchConfig::default();
        PitchConfig {
            min_lag: self.min_lag.unwrap_or(defaults.min_lag),
            confidence_ratio: self.confidence_ratio.unwrap_or(defaults.confidence_ratio),
            max_dip_ratio: self.max_dip_ratio.unwrap_or(defaults.max_dip_ratio),
            octave_tolerance: self.octave_tolerance.unwrap_or(defaults.octave_tolerance),
        }
    }

    /// Returns the note trigger configuration.
    pub fn trigger(&self) -> TriggerConfig {
        let defaults = TriggerConfig::default();
        TriggerConfig {
            attack_threshold: self.attack_threshold.unwrap_or(defaults.attack_threshold),
            release_threshold: self.release_threshold.unwrap_or(defaults.release_threshold),
            velocity: self.velocity.unwrap_or(defaults.velocity),
            epic_velocity: self.epic_velocity.unwrap_or(defaults.epic_velocity),
            confirm_ticks: self.confirm_ticks.unwrap_or(defaults.confirm_ticks),
        }
    }

    /// Returns the interval between scheduler ticks (default: 16ms).
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        match &self.tick_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())
                .map_err(|e| ConfigError::Duration {
                    field: "tracker.tick_interval".to_string(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_TICK_INTERVAL),
        }
    }

    /// Checks that the thresholds and ratios make sense for the given frame size.
    pub fn validate(&self, frame_size: usize) -> Result<(), ConfigError> {
        let pitch = self.pitch();
        let trigger = self.trigger();

        if trigger.attack_threshold < 0.0 || trigger.release_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "loudness thresholds must not be negative".to_string(),
            ));
        }
        if trigger.release_threshold > trigger.attack_threshold {
            return Err(ConfigError::Invalid(format!(
                "release_threshold ({}) must not exceed attack_threshold ({})",
                trigger.release_threshold, trigger.attack_threshold
            )));
        }
        for (name, velocity) in [
            ("velocity", trigger.velocity),
            ("epic_velocity", trigger.epic_velocity),
        ] {
            if !(velocity > 0.0 && velocity <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in (0, 1], got {}",
                    name, velocity
                )));
            }
        }
        for (name, ratio) in [
            ("confidence_ratio", pitch.confidence_ratio),
            ("max_dip_ratio", pitch.max_dip_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if !(0.0..=1.0).contains(&pitch.octave_tolerance) {
            return Err(ConfigError::Invalid(format!(
                "octave_tolerance must be in [0, 1], got {}",
                pitch.octave_tolerance
            )));
        }
        if pitch.min_lag == 0 || frame_size / 2 <= pitch.min_lag + 2 {
            return Err(ConfigError::Invalid(format!(
                "frame_size {} is too small for min_lag {}",
                frame_size, pitch.min_lag
            )));
        }
        if trigger.confirm_ticks == 0 {
            return Err(ConfigError::Invalid(
                "confirm_ticks must be at least 1".to_string(),
            ));
        }
        if self.tick_interval()?.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Tracker {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let tracker = parse("{}");
        assert_eq!(tracker.pitch(), PitchConfig::default());
        assert_eq!(tracker.trigger(), TriggerConfig::default());
        assert_eq!(tracker.tick_interval().unwrap(), Duration::from_millis(16));
        assert!(tracker.validate(1024).is_ok());
    }

    #[test]
    fn test_overrides() {
        let tracker = parse(
            r#"
            min_lag: 40
            confidence_ratio: 0.8
            attack_threshold: 0.03
            release_threshold: 0.015
            epic_velocity: 0.5
            confirm_ticks: 2
            tick_interval: 20ms
        "#,
        );

        assert_eq!(tracker.pitch().min_lag, 40);
        assert_eq!(tracker.pitch().confidence_ratio, 0.8);
        assert_eq!(tracker.pitch().max_dip_ratio, 0.5);
        assert_eq!(tracker.trigger().attack_threshold, 0.03);
        assert_eq!(tracker.trigger().release_threshold, 0.015);
        assert_eq!(tracker.trigger().epic_velocity, 0.5);
        assert_eq!(tracker.trigger().confirm_ticks, 2);
        assert_eq!(tracker.tick_interval().unwrap(), Duration::from_millis(20));
        assert!(tracker.validate(1024).is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(parse("release_threshold: 0.05").validate(1024).is_err());
        assert!(parse("attack_threshold: -0.1").validate(1024).is_err());
        assert!(parse("confidence_ratio: 1.5").validate(1024).is_err());
        assert!(parse("velocity: 0").validate(1024).is_err());
        assert!(parse("confirm_ticks: 0").validate(1024).is_err());
        assert!(parse("tick_interval: soon").validate(1024).is_err());
        assert!(matches!(
            parse("tick_interval: 0ms").validate(1024),
            Err(ConfigError::Invalid(_))
        ));
        assert!(parse("tick_interval: 1ms").validate(1024).is_ok());
        assert!(parse("{}").validate(100).is_err());
        assert!(parse("min_lag: 20").validate(100).is_ok());
    }
}
