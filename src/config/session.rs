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
use std::path::PathBuf;

use serde::Deserialize;

use super::error::ConfigError;
use super::instrument::EnvelopeConfig;
use crate::samples::Envelope;
use crate::tracker::ScaleFilter;

const DEFAULT_BPM: u32 = 120;
const DEFAULT_EXPORT_DIR: &str = "recordings";

/// A YAML representation of the initial session settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Session {
    /// The scale filter notes are snapped to.
    scale: Option<ScaleFilter>,

    /// Whether the octave-below layer is on.
    epic: Option<bool>,

    /// The instrument selected at startup.
    instrument: Option<String>,

    /// Tempo stored alongside recordings.
    bpm: Option<u32>,

    /// Where exported recordings are written.
    export_dir: Option<String>,

    /// Overrides the envelope of every instrument.
    envelope: Option<EnvelopeConfig>,
}

impl Session {
    /// Returns the initial scale filter (default: chromatic).
    pub fn scale(&self) -> ScaleFilter {
        self.scale.unwrap_or_default()
    }

    /// Returns whether the octave-below layer starts on (default: true).
    pub fn epic(&self) -> bool {
        self.epic.unwrap_or(true)
    }

    /// Returns the configured instrument, if any.
    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    /// Returns the tempo (default: 120).
    pub fn bpm(&self) -> u32 {
        self.bpm.unwrap_or(DEFAULT_BPM)
    }

    /// Returns the export directory (default: "recordings").
    pub fn export_dir(&self) -> PathBuf {
        PathBuf::from(self.export_dir.as_deref().unwrap_or(DEFAULT_EXPORT_DIR))
    }

    /// Returns the envelope override, if any.
    pub fn envelope(&self) -> Result<Option<Envelope>, ConfigError> {
        self.envelope.as_ref().map(EnvelopeConfig::envelope).transpose()
    }
}
