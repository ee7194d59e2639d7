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
use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::config;
use crate::tracker::ScaleFilter;

/// The session values the UI may change while the loop runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub scale: ScaleFilter,
    pub epic: bool,
    pub instrument: String,
}

impl Settings {
    /// Builds the initial settings from configuration.
    pub fn from_config(config: &config::Studio) -> Settings {
        Settings {
            scale: config.session().scale(),
            epic: config.session().epic(),
            instrument: config.instrument(),
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scale={} epic={} instrument={}",
            self.scale,
            if self.epic { "on" } else { "off" },
            self.instrument
        )
    }
}

/// Settings shared between the UI and the scheduler loop. Readers always see
/// a consistent snapshot of all three values.
#[derive(Clone, Debug)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> SharedSettings {
        SharedSettings {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    pub fn set_scale(&self, scale: ScaleFilter) {
        self.inner.write().scale = scale;
    }

    pub fn set_epic(&self, epic: bool) {
        self.inner.write().epic = epic;
    }

    pub fn set_instrument(&self, instrument: &str) {
        self.inner.write().instrument = instrument.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_updates_are_visible() {
        let shared = SharedSettings::new(Settings {
            scale: ScaleFilter::Chromatic,
            epic: false,
            instrument: "piano".to_string(),
        });
        let reader = shared.clone();

        shared.set_scale(ScaleFilter::Minor);
        shared.set_epic(true);
        shared.set_instrument("strings");

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.scale, ScaleFilter::Minor);
        assert!(snapshot.epic);
        assert_eq!(snapshot.instrument, "strings");
        assert_eq!(snapshot.to_string(), "scale=MIN epic=on instrument=strings");
    }

    #[test]
    fn test_from_config() {
        let studio = config::Studio::from_yaml("session: { scale: major, epic: false }").unwrap();
        let settings = Settings::from_config(&studio);
        assert_eq!(settings.scale, ScaleFilter::Major);
        assert!(!settings.epic);
        assert_eq!(settings.instrument, crate::samples::BUILTIN_INSTRUMENT);
    }
}
