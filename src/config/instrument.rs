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
use crate::samples::{Curve, Envelope};
use crate::tracker::MusicalNote;

/// Default playable range, the 88 keys of a piano.
const DEFAULT_RANGE: (i32, i32) = (21, 108);

/// A YAML representation of a sampled instrument.
#[derive(Deserialize, Clone, Debug)]
pub struct Instrument {
    /// Lowest and highest playable note indices.
    range: Option<Vec<i32>>,

    /// Attack/release envelope.
    #[serde(default)]
    envelope: EnvelopeConfig,

    /// Pitched sample zones.
    samples: Vec<Zone>,
}

/// A YAML representation of an envelope.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EnvelopeConfig {
    attack: Option<String>,
    release: Option<String>,
    curve: Option<Curve>,
}

impl EnvelopeConfig {
    /// Returns the envelope, filling unset fields with defaults.
    pub fn envelope(&self) -> Result<Envelope, ConfigError> {
        let defaults = Envelope::default();
        Ok(Envelope {
            attack: parse_duration("envelope.attack", &self.attack)?.unwrap_or(defaults.attack),
            release: parse_duration("envelope.release", &self.release)?
                .unwrap_or(defaults.release),
            curve: self.curve.unwrap_or(defaults.curve),
        })
    }
}

/// A sample recorded at a given note.
#[derive(Deserialize, Clone, Debug)]
pub struct Zone {
    /// The note the sample was recorded at, e.g. "C4".
    note: String,

    /// The audio file, relative to the configuration file.
    file: String,
}

impl Zone {
    /// Returns the root note of the zone.
    pub fn note(&self) -> Result<MusicalNote, ConfigError> {
        self.note
            .parse()
            .map_err(|_| ConfigError::Note(self.note.clone()))
    }

    /// Returns the sample file.
    pub fn file(&self) -> &str {
        &self.file
    }
}

impl Instrument {
    /// Returns the lowest and highest playable notes.
    pub fn range(&self) -> Result<(MusicalNote, MusicalNote), ConfigError> {
        let (low, high) = match self.range.as_deref() {
            None => DEFAULT_RANGE,
            Some([low, high]) if low <= high => (*low, *high),
            Some(range) => {
                return Err(ConfigError::Invalid(format!(
                    "instrument range must be [low, high], got {:?}",
                    range
                )))
            }
        };
        Ok((MusicalNote::new(low), MusicalNote::new(high)))
    }

    /// Returns the envelope, filling unset fields with defaults.
    pub fn envelope(&self) -> Result<Envelope, ConfigError> {
        self.envelope.envelope()
    }

    /// Returns the sample zones.
    pub fn samples(&self) -> &[Zone] {
        &self.samples
    }

    /// Checks the range, envelope and zone notes.
    pub fn validate(&self, id: &str) -> Result<(), ConfigError> {
        self.range()?;
        self.envelope()?;
        if self.samples.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "instrument {} has no samples",
                id
            )));
        }
        for zone in &self.samples {
            zone.note()?;
        }
        Ok(())
    }
}

fn parse_duration(field: &str, value: &Option<String>) -> Result<Option<Duration>, ConfigError> {
    match value {
        Some(value) => Ok(Some(
            DurationString::from_string(value.clone())
                .map_err(|e| ConfigError::Duration {
                    field: field.to_string(),
                    reason: e.to_string(),
                })?
                .into(),
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Instrument {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_instrument() {
        let instrument = parse(
            r#"
            range: [36, 96]
            envelope:
              attack: 10ms
              release: 2s
              curve: linear
            samples:
              - note: C4
                file: piano/C4.mp3
              - note: F#4
                file: piano/Fs4.mp3
        "#,
        );

        let (low, high) = instrument.range().unwrap();
        assert_eq!((low.index(), high.index()), (36, 96));
        assert_eq!(
            instrument.envelope().unwrap(),
            Envelope {
                attack: Duration::from_millis(10),
                release: Duration::from_secs(2),
                curve: Curve::Linear,
            }
        );
        assert_eq!(instrument.samples().len(), 2);
        assert_eq!(instrument.samples()[1].note().unwrap().index(), 66);
        assert_eq!(instrument.samples()[1].file(), "piano/Fs4.mp3");
        assert!(instrument.validate("piano").is_ok());
    }

    #[test]
    fn test_defaults() {
        let instrument = parse(
            r#"
            samples:
              - note: A4
                file: a.wav
        "#,
        );

        let (low, high) = instrument.range().unwrap();
        assert_eq!((low.index(), high.index()), DEFAULT_RANGE);
        assert_eq!(instrument.envelope().unwrap(), Envelope::default());
    }

    #[test]
    fn test_invalid() {
        let bad_range = parse(
            r#"
            range: [96, 36]
            samples:
              - note: A4
                file: a.wav
        "#,
        );
        assert!(bad_range.validate("x").is_err());

        let bad_note = parse(
            r#"
            samples:
              - note: H4
                file: a.wav
        "#,
        );
        assert!(matches!(bad_note.validate("x"), Err(ConfigError::Note(_))));

        let bad_envelope = parse(
            r#"
            envelope:
              release: forever
            samples:
              - note: A4
                file: a.wav
        "#,
        );
        assert!(matches!(
            bad_envelope.validate("x"),
            Err(ConfigError::Duration { .. })
        ));
    }
}
