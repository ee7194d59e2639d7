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
use std::{error::Error, sync::Arc};

use parking_lot::Mutex;

use super::Envelope;
use crate::tracker::MusicalNote;

/// A call received by the mock engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Attack(MusicalNote, f32),
    ReleaseAll,
    ConfigureEnvelope(Envelope),
    SetInstrument(String),
}

/// A voice engine that records every call instead of making sound. Clones
/// share the same call log.
#[derive(Clone, Default)]
pub struct VoiceEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    /// Instruments accepted by set_active_instrument. None accepts anything.
    instruments: Option<Vec<String>>,
}

impl VoiceEngine {
    /// Creates a mock engine that accepts any instrument.
    pub fn new() -> VoiceEngine {
        VoiceEngine::default()
    }

    /// Creates a mock engine that only knows the given instruments.
    pub fn with_instruments(instruments: &[&str]) -> VoiceEngine {
        VoiceEngine {
            calls: Arc::default(),
            instruments: Some(instruments.iter().map(|i| i.to_string()).collect()),
        }
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Removes and returns every call received so far.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Forgets all recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl super::VoiceEngine for VoiceEngine {
    fn attack(&mut self, note: MusicalNote, velocity: f32) {
        self.calls.lock().push(Call::Attack(note, velocity));
    }

    fn release_all(&mut self) {
        self.calls.lock().push(Call::ReleaseAll);
    }

    fn configure_envelope(&mut self, envelope: Envelope) {
        self.calls.lock().push(Call::ConfigureEnvelope(envelope));
    }

    fn set_active_instrument(&mut self, id: &str) -> Result<(), Box<dyn Error>> {
        if let Some(instruments) = &self.instruments {
            if !instruments.iter().any(|i| i == id) {
                return Err(format!("unknown instrument {}", id).into());
            }
        }
        self.calls.lock().push(Call::SetInstrument(id.to_string()));
        Ok(())
    }
}
