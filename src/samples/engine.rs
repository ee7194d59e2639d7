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

//! Sampler engine that maps notes to pitched sample zones and plays them.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::envelope::Envelope;
use super::loader::{LoadedSample, SampleLoader};
use super::voice::{Voice, VoiceManager};
use super::VoiceEngine;
use crate::audio::Render;
use crate::config;
use crate::tracker::MusicalNote;

/// Default maximum number of concurrent voices.
pub const DEFAULT_MAX_VOICES: usize = 32;

/// Name of the built-in instrument used when none are configured.
pub const BUILTIN_INSTRUMENT: &str = "tone";

/// Lowest and highest notes of the built-in instrument.
const BUILTIN_RANGE: (i32, i32) = (21, 108);

/// Length of the built-in instrument's sample, in seconds.
const BUILTIN_LENGTH_SECS: f32 = 4.0;

/// A set of pitched sample zones with a playable range and an envelope.
pub struct Instrument {
    id: String,
    low: MusicalNote,
    high: MusicalNote,
    envelope: Envelope,
    /// Samples keyed by the index of the note they were recorded at.
    zones: BTreeMap<i32, LoadedSample>,
}

impl Instrument {
    /// Creates an instrument with no zones.
    pub fn new(id: &str, low: MusicalNote, high: MusicalNote, envelope: Envelope) -> Instrument {
        Instrument {
            id: id.to_string(),
            low,
            high,
            envelope,
            zones: BTreeMap::new(),
        }
    }

    /// Loads an instrument and all of its zones from configuration.
    pub fn from_config(
        id: &str,
        config: &config::Instrument,
        base_path: &Path,
        loader: &mut SampleLoader,
    ) -> Result<Instrument, Box<dyn Error>> {
        let (low, high) = config.range()?;
        let mut instrument = Instrument::new(id, low, high, config.envelope()?);

        for zone in config.samples() {
            let root = zone.note()?;
            let file = Path::new(zone.file());
            let path = if file.is_absolute() {
                PathBuf::from(file)
            } else {
                base_path.join(file)
            };
            instrument.add_zone(root, loader.load(&path)?);
        }

        if instrument.zones.is_empty() {
            return Err(format!("instrument {} has no samples", id).into());
        }

        Ok(instrument)
    }

    /// Creates the built-in instrument: a single decaying harmonic tone rooted
    /// at A4, synthesized at the given sample rate.
    pub fn builtin(sample_rate: u32) -> Instrument {
        let root = MusicalNote::new(69);
        let frequency = root.frequency();
        let len = (BUILTIN_LENGTH_SECS * sample_rate as f32) as usize;
        let data = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let phase = 2.0 * PI * frequency * t;
                let tone = phase.sin() + 0.5 * (2.0 * phase).sin() + 0.25 * (3.0 * phase).sin();
                0.4 * tone * (-1.5 * t).exp()
            })
            .collect();

        let mut instrument = Instrument::new(
            BUILTIN_INSTRUMENT,
            MusicalNote::new(BUILTIN_RANGE.0),
            MusicalNote::new(BUILTIN_RANGE.1),
            Envelope::default(),
        );
        instrument.add_zone(root, LoadedSample::from_mono(data, sample_rate));
        instrument
    }

    /// Adds a zone recorded at the given root note.
    pub fn add_zone(&mut self, root: MusicalNote, sample: LoadedSample) {
        self.zones.insert(root.index(), sample);
    }

    /// Returns the instrument ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the instrument's envelope.
    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    /// Returns true if the note lies within the playable range.
    pub fn in_range(&self, note: MusicalNote) -> bool {
        self.low <= note && note <= self.high
    }

    /// Finds the zone whose root is nearest to the note. Ties go to the lower root.
    fn zone_for(&self, note: MusicalNote) -> Option<(MusicalNote, &LoadedSample)> {
        let index = note.index();
        let below = self.zones.range(..=index).next_back();
        let above = self.zones.range(index..).next();

        let (root, sample) = match (below, above) {
            (Some(below), Some(above)) => {
                if index - below.0 <= above.0 - index {
                    below
                } else {
                    above
                }
            }
            (Some(zone), None) | (None, Some(zone)) => zone,
            (None, None) => return None,
        };
        Some((MusicalNote::new(*root), sample))
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("id", &self.id)
            .field("range", &format!("{}..={}", self.low, self.high))
            .field("zones", &self.zones.len())
            .finish()
    }
}

/// Renders the sampler's voices on the output thread.
struct SamplerOutput {
    voices: Arc<Mutex<VoiceManager>>,
}

impl Render for SamplerOutput {
    fn render(&self, output: &mut [f32]) {
        output.fill(0.0);
        self.voices.lock().render(output);
    }
}

/// The sampler voice engine.
pub struct SamplerEngine {
    instruments: HashMap<String, Instrument>,
    /// ID of the instrument new notes are played on.
    active: Option<String>,
    /// Envelope applied to new voices.
    envelope: Envelope,
    voices: Arc<Mutex<VoiceManager>>,
    sample_rate: u32,
}

impl SamplerEngine {
    /// Creates an engine with no instruments.
    pub fn new(sample_rate: u32, max_voices: usize) -> SamplerEngine {
        SamplerEngine {
            instruments: HashMap::new(),
            active: None,
            envelope: Envelope::default(),
            voices: Arc::new(Mutex::new(VoiceManager::new(max_voices))),
            sample_rate,
        }
    }

    /// Loads every configured instrument and activates the session's default.
    /// Falls back to the built-in instrument when none are configured.
    pub fn from_config(
        config: &config::Studio,
        sample_rate: u32,
    ) -> Result<SamplerEngine, Box<dyn Error>> {
        let mut engine = SamplerEngine::new(sample_rate, DEFAULT_MAX_VOICES);
        let mut loader = SampleLoader::new(sample_rate);

        if config.instruments().is_empty() {
            info!("No instruments configured, using the built-in tone");
            engine.add_instrument(Instrument::builtin(sample_rate));
        }
        for (id, instrument) in config.instruments() {
            engine.add_instrument(Instrument::from_config(
                id,
                instrument,
                config.base_path(),
                &mut loader,
            )?);
        }

        engine.set_active_instrument(&config.instrument())?;
        info!(
            instruments = engine.instruments.len(),
            memory_kb = loader.total_memory_usage() / 1024,
            "Instruments loaded"
        );
        Ok(engine)
    }

    /// Registers an instrument. The first one registered becomes active.
    pub fn add_instrument(&mut self, instrument: Instrument) {
        if self.active.is_none() {
            self.active = Some(instrument.id.clone());
            self.envelope = instrument.envelope;
        }
        self.instruments.insert(instrument.id.clone(), instrument);
    }

    /// Returns the active instrument ID, if any.
    pub fn active_instrument(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Returns the IDs of every registered instrument, sorted.
    pub fn instrument_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instruments.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns a renderer that mixes this engine's voices.
    pub fn renderer(&self) -> Arc<dyn Render> {
        Arc::new(SamplerOutput {
            voices: self.voices.clone(),
        })
    }

    /// Returns the number of voices currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.lock().active_count()
    }

    /// Returns the number of voices not yet released.
    pub fn held_voices(&self) -> usize {
        self.voices.lock().held_count()
    }
}

impl VoiceEngine for SamplerEngine {
    fn attack(&mut self, note: MusicalNote, velocity: f32) {
        let Some(instrument) = self.active.as_ref().and_then(|id| self.instruments.get(id)) else {
            warn!(note = %note, "No active instrument, ignoring attack");
            return;
        };

        if !instrument.in_range(note) {
            debug!(note = %note, instrument = instrument.id, "Note outside instrument range");
            return;
        }

        let Some((root, sample)) = instrument.zone_for(note) else {
            return;
        };

        let rate = 2f64.powf((note.index() - root.index()) as f64 / 12.0)
            * sample.sample_rate() as f64
            / self.sample_rate as f64;
        let voice = Voice::new(
            note,
            sample.clone(),
            rate,
            velocity,
            &self.envelope,
            self.sample_rate,
        );
        self.voices.lock().add_voice(voice);
        debug!(note = %note, root = %root, velocity, "Voice started");
    }

    fn release_all(&mut self) {
        self.voices.lock().release_all();
    }

    fn configure_envelope(&mut self, envelope: Envelope) {
        self.envelope = envelope;
    }

    fn set_active_instrument(&mut self, id: &str) -> Result<(), Box<dyn Error>> {
        let instrument = self
            .instruments
            .get(id)
            .ok_or_else(|| format!("unknown instrument {}", id))?;

        if self.active.as_deref() != Some(id) {
            self.voices.lock().release_all();
            self.active = Some(id.to_string());
            self.envelope = instrument.envelope;
            info!(instrument = id, "Instrument selected");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SamplerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerEngine")
            .field("instruments", &self.instruments.len())
            .field("active", &self.active)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
