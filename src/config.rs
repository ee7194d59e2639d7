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
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::samples::BUILTIN_INSTRUMENT;

mod audio;
mod effects;
mod error;
mod instrument;
mod session;
mod tracker;

pub use self::audio::Audio;
pub use self::effects::Effects;
pub use self::error::ConfigError;
pub use self::instrument::{Instrument, Zone};
pub use self::session::Session;
pub use self::tracker::Tracker;

/// The complete studio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Studio {
    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    tracker: Tracker,

    #[serde(default)]
    session: Session,

    #[serde(default)]
    effects: Effects,

    /// Sampled instruments by ID.
    #[serde(default)]
    instruments: HashMap<String, Instrument>,

    /// Directory relative sample paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Studio {
    /// Parses and validates a studio configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Studio, ConfigError> {
        let mut studio = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Studio>()?;
        studio.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        studio.validate()?;
        Ok(studio)
    }

    /// Parses and validates a studio configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Studio, ConfigError> {
        let studio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Studio>()?;
        studio.validate()?;
        Ok(studio)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate(self.audio.frame_size())?;
        self.effects.validate()?;
        self.session.envelope()?;
        if self.audio.sample_rate() == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        for (id, instrument) in &self.instruments {
            instrument.validate(id)?;
        }
        if !self.instruments.contains_key(&self.instrument()) && !self.instruments.is_empty() {
            return Err(ConfigError::UnknownInstrument(self.instrument()));
        }
        Ok(())
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the tracker configuration.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Returns the initial session settings.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the effects configuration.
    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Returns the configured instruments.
    pub fn instruments(&self) -> &HashMap<String, Instrument> {
        &self.instruments
    }

    /// Returns the instrument selected at startup: the session's choice, else the
    /// alphabetically first configured instrument, else the built-in one.
    pub fn instrument(&self) -> String {
        if let Some(instrument) = self.session.instrument() {
            return instrument.to_string();
        }
        self.instruments
            .keys()
            .min()
            .cloned()
            .unwrap_or_else(|| BUILTIN_INSTRUMENT.to_string())
    }

    /// Returns the directory relative paths are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Replaces the audio configuration.
    pub fn with_audio(mut self, audio: Audio) -> Studio {
        self.audio = audio;
        self
    }
}
