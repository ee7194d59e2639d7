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

//! Monophonic pitch tracking.
//!
//! This module provides:
//! - RMS loudness estimation
//! - AMDF fundamental frequency estimation with confidence gating
//! - Frequency to note quantization with optional scale snapping
//! - The attack/release trigger state machine that drives a voice engine

mod loudness;
mod note;
mod pitch;
mod trigger;

pub use loudness::rms;
pub use note::{quantize, MusicalNote, ScaleFilter};
pub use pitch::{PitchConfig, PitchEstimator};
pub use trigger::{NoteTrigger, Transition, TriggerConfig, TriggerState};
