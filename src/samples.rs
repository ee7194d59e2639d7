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

//! Sample-based voice engine.
//!
//! This module provides:
//! - The voice engine interface the note trigger drives
//! - Sample loading and caching (in-memory for zero-latency playback)
//! - Pitched sample zones with attack/release envelopes
//! - Voice management with a polyphony limit

use std::error::Error;

use crate::tracker::MusicalNote;

mod engine;
mod envelope;
mod loader;
pub mod mock;
mod voice;

pub use engine::{Instrument, SamplerEngine, BUILTIN_INSTRUMENT};
pub use envelope::{Curve, Envelope};
pub use loader::{LoadedSample, SampleLoader};

/// A sampler or synth that notes are played on. Calls are fire-and-forget and
/// must not block on I/O.
pub trait VoiceEngine: Send {
    /// Starts a note at the given velocity in [0, 1].
    fn attack(&mut self, note: MusicalNote, velocity: f32);

    /// Moves every sounding voice to its release stage.
    fn release_all(&mut self);

    /// Sets the envelope used for subsequent attacks.
    fn configure_envelope(&mut self, envelope: Envelope);

    /// Selects the instrument subsequent attacks are played on.
    fn set_active_instrument(&mut self, id: &str) -> Result<(), Box<dyn Error>>;
}
