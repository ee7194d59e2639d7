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

//! Voice management for polyphonic sample playback.
//!
//! Handles voice allocation, stealing, release and mixing.

use tracing::warn;

use super::envelope::{Envelope, EnvelopeState};
use super::loader::LoadedSample;
use crate::tracker::MusicalNote;

/// Represents an active voice playing a sample.
pub struct Voice {
    /// Allocation order, used to find the oldest voice.
    id: u64,
    /// The note that triggered this voice.
    note: MusicalNote,
    /// The sample being played.
    sample: LoadedSample,
    /// Read position in the sample, in source samples.
    position: f64,
    /// Source samples advanced per output sample.
    rate: f64,
    /// Gain applied on top of the envelope.
    velocity: f32,
    envelope: EnvelopeState,
}

impl Voice {
    /// Creates a new voice. `rate` is the number of source samples to advance
    /// per output sample, and `sample_rate` is the output rate.
    pub fn new(
        note: MusicalNote,
        sample: LoadedSample,
        rate: f64,
        velocity: f32,
        envelope: &Envelope,
        sample_rate: u32,
    ) -> Self {
        let envelope = EnvelopeState::new(envelope, sample_rate);
        Self {
            id: 0,
            note,
            sample,
            position: 0.0,
            rate,
            velocity: velocity.clamp(0.0, 1.0),
            envelope,
        }
    }

    /// Returns true until the sample or the envelope runs out.
    pub fn is_active(&self) -> bool {
        self.envelope.is_active() && self.position < self.sample.len() as f64
    }

    /// Starts the release stage.
    pub fn release(&mut self) {
        self.envelope.release();
    }

    /// Mixes this voice into the output buffer.
    fn mix_into(&mut self, output: &mut [f32]) {
        let data = self.sample.data();
        for out in output.iter_mut() {
            if !self.is_active() {
                break;
            }

            let index = self.position.floor() as usize;
            let frac = (self.position - index as f64) as f32;
            let s0 = data[index];
            let s1 = data.get(index + 1).copied().unwrap_or(0.0);
            let level = self.envelope.next_level();
            *out += (s0 + (s1 - s0) * frac) * level * self.velocity;
            self.position += self.rate;
        }
    }
}

/// Manages active voices for sample playback.
pub struct VoiceManager {
    /// Active voices.
    voices: Vec<Voice>,
    /// Global maximum voices limit.
    max_voices: usize,
    /// Next allocation ID.
    next_id: u64,
}

impl VoiceManager {
    /// Creates a new voice manager.
    pub fn new(max_voices: usize) -> Self {
        Self {
            voices: Vec::new(),
            max_voices: max_voices.max(1),
            next_id: 1,
        }
    }

    /// Adds a new voice, stealing the oldest one if the limit is reached.
    /// Returns the note of the stolen voice, if any.
    pub fn add_voice(&mut self, mut voice: Voice) -> Option<MusicalNote> {
        voice.id = self.next_id;
        self.next_id += 1;

        let mut stolen = None;
        if self.voices.len() >= self.max_voices {
            if let Some(oldest) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.id)
                .map(|(i, _)| i)
            {
                let voice = self.voices.remove(oldest);
                warn!(
                    max_voices = self.max_voices,
                    note = %voice.note,
                    "Voice limit reached, stealing oldest"
                );
                stolen = Some(voice.note);
            }
        }

        self.voices.push(voice);
        stolen
    }

    /// Moves every voice into its release stage.
    pub fn release_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.release();
        }
    }

    /// Mixes all voices into the output buffer and drops finished ones.
    pub fn render(&mut self, output: &mut [f32]) {
        for voice in self.voices.iter_mut() {
            voice.mix_into(output);
        }
        self.voices.retain(|v| v.is_active());
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Returns the number of voices not yet released.
    pub fn held_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|v| !v.envelope.is_releasing())
            .count()
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("active_voices", &self.voices.len())
            .field("max_voices", &self.max_voices)
            .finish()
    }
}
