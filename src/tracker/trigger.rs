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

//! The note trigger state machine.
//!
//! Decides once per tick whether the voice engine should attack a new note,
//! release everything, or do nothing. Two loudness thresholds give hysteresis:
//! a note starts only above the attack threshold and stops only below the
//! lower release threshold.

use std::fmt;

use tracing::{debug, warn};

use super::note::MusicalNote;
use crate::samples::VoiceEngine;

/// What is currently audible from pitch tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TriggerState {
    /// Nothing is sounding.
    #[default]
    Silent,
    /// A single note is sounding.
    Sounding(MusicalNote),
}

impl TriggerState {
    /// Returns the sounding note, if any.
    pub fn note(&self) -> Option<MusicalNote> {
        match self {
            TriggerState::Silent => None,
            TriggerState::Sounding(note) => Some(*note),
        }
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::Silent => write!(f, "--"),
            TriggerState::Sounding(note) => write!(f, "{}", note),
        }
    }
}

/// The outcome of a single update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// State unchanged, no voice engine calls were made.
    None,
    /// Silent to sounding.
    Attack(MusicalNote),
    /// One note replaced by another.
    Retrigger {
        from: MusicalNote,
        to: MusicalNote,
    },
    /// Sounding to silent.
    Release(MusicalNote),
}

/// Thresholds and velocities used by the trigger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerConfig {
    /// Loudness at or above which a note may start.
    pub attack_threshold: f32,
    /// Loudness below which a sounding note is released. Never above the
    /// attack threshold.
    pub release_threshold: f32,
    /// Velocity of the primary note.
    pub velocity: f32,
    /// Velocity of the octave-below layer.
    pub epic_velocity: f32,
    /// Number of consecutive qualifying ticks a new note has to be seen on
    /// before it is triggered.
    pub confirm_ticks: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            attack_threshold: 0.02,
            release_threshold: 0.01,
            velocity: 1.0,
            epic_velocity: 0.4,
            confirm_ticks: 1,
        }
    }
}

/// Owns the sounding-note state and drives a voice engine from it.
pub struct NoteTrigger {
    config: TriggerConfig,
    state: TriggerState,
    /// A candidate note waiting for confirmation, with the ticks seen so far.
    pending: Option<(MusicalNote, u32)>,
}

impl NoteTrigger {
    /// Creates a new trigger in the silent state.
    pub fn new(config: TriggerConfig) -> NoteTrigger {
        NoteTrigger {
            config,
            state: TriggerState::Silent,
            pending: None,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Evaluates one tick. `note` is the quantized pitch for the tick, if the
    /// estimator found one.
    pub fn update(
        &mut self,
        loudness: f32,
        note: Option<MusicalNote>,
        epic: bool,
        engine: &mut dyn VoiceEngine,
    ) -> Transition {
        let loudness = if loudness.is_finite() {
            loudness
        } else {
            warn!(loudness, "Non-finite loudness, treating as silence");
            0.0
        };

        if loudness >= self.config.attack_threshold {
            if let Some(note) = note {
                if self.state.note() != Some(note) {
                    if !self.confirm(note) {
                        return Transition::None;
                    }
                    return self.sound(note, epic, engine);
                }
            }
            self.pending = None;
            return Transition::None;
        }

        self.pending = None;
        if loudness < self.config.release_threshold {
            if let TriggerState::Sounding(note) = self.state {
                engine.release_all();
                self.state = TriggerState::Silent;
                debug!(note = %note, loudness, "Released");
                return Transition::Release(note);
            }
        }

        Transition::None
    }

    /// Forces the trigger back to silence, releasing the engine if needed.
    pub fn reset(&mut self, engine: &mut dyn VoiceEngine) -> Transition {
        self.pending = None;
        match self.state {
            TriggerState::Silent => Transition::None,
            TriggerState::Sounding(note) => {
                engine.release_all();
                self.state = TriggerState::Silent;
                Transition::Release(note)
            }
        }
    }

    /// Counts a sighting of a candidate note. Returns true once it has been seen
    /// on enough consecutive ticks.
    fn confirm(&mut self, note: MusicalNote) -> bool {
        let seen = match self.pending {
            Some((pending, seen)) if pending == note => seen + 1,
            _ => 1,
        };

        if seen >= self.config.confirm_ticks {
            self.pending = None;
            true
        } else {
            self.pending = Some((note, seen));
            false
        }
    }

    /// Releases whatever is sounding and attacks the new note.
    fn sound(&mut self, note: MusicalNote, epic: bool, engine: &mut dyn VoiceEngine) -> Transition {
        engine.release_all();
        engine.attack(note, self.config.velocity);
        if epic {
            engine.attack(note.transpose(-12), self.config.epic_velocity);
        }

        let previous = self.state;
        self.state = TriggerState::Sounding(note);
        debug!(note = %note, epic, "Attacked");

        match previous {
            TriggerState::Silent => Transition::Attack(note),
            TriggerState::Sounding(from) => Transition::Retrigger { from, to: note },
        }
    }
}

impl fmt::Debug for NoteTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteTrigger")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::mock::{Call, VoiceEngine as MockEngine};

    const A4: MusicalNote = MusicalNote::new(69);
    const B4: MusicalNote = MusicalNote::new(71);

    #[test]
    fn test_attack_from_silence() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        let transition = trigger.update(0.05, Some(A4), false, &mut engine);
        assert_eq!(transition, Transition::Attack(A4));
        assert_eq!(trigger.state(), TriggerState::Sounding(A4));
        assert_eq!(engine.calls(), vec![Call::ReleaseAll, Call::Attack(A4, 1.0)]);
    }

    #[test]
    fn test_epic_layer() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), true, &mut engine);
        assert_eq!(
            engine.calls(),
            vec![
                Call::ReleaseAll,
                Call::Attack(A4, 1.0),
                Call::Attack(MusicalNote::new(57), 0.4)
            ]
        );
    }

    #[test]
    fn test_repeated_ticks_are_idempotent() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), false, &mut engine);
        engine.clear();
        for _ in 0..100 {
            assert_eq!(
                trigger.update(0.05, Some(A4), false, &mut engine),
                Transition::None
            );
        }
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_no_pitch_keeps_sounding() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), false, &mut engine);
        engine.clear();
        assert_eq!(trigger.update(0.05, None, false, &mut engine), Transition::None);
        assert_eq!(trigger.state(), TriggerState::Sounding(A4));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_quiet_pitch_does_not_attack() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        assert_eq!(trigger.update(0.015, Some(A4), false, &mut engine), Transition::None);
        assert_eq!(trigger.update(0.001, Some(A4), false, &mut engine), Transition::None);
        assert_eq!(trigger.state(), TriggerState::Silent);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_hysteresis() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig {
            release_threshold: 0.015,
            ..Default::default()
        });

        trigger.update(0.05, Some(A4), false, &mut engine);
        engine.clear();

        // Dips between the thresholds keep the note, whatever the pitch says.
        for loudness in [0.019, 0.016, 0.015, 0.018, 0.017] {
            assert_eq!(
                trigger.update(loudness, Some(B4), false, &mut engine),
                Transition::None
            );
            assert_eq!(trigger.state(), TriggerState::Sounding(A4));
        }
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_dip_between_thresholds_does_not_release() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), false, &mut engine);
        engine.clear();
        for loudness in [0.019, 0.012, 0.01, 0.015] {
            trigger.update(loudness, None, false, &mut engine);
        }
        assert_eq!(trigger.state(), TriggerState::Sounding(A4));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_release() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), false, &mut engine);
        engine.clear();

        assert_eq!(
            trigger.update(0.005, None, false, &mut engine),
            Transition::Release(A4)
        );
        assert_eq!(trigger.state(), TriggerState::Silent);
        assert_eq!(engine.calls(), vec![Call::ReleaseAll]);

        // Staying quiet does nothing further.
        engine.clear();
        trigger.update(0.001, None, false, &mut engine);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_retrigger_on_new_note() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), true, &mut engine);
        engine.clear();

        assert_eq!(
            trigger.update(0.05, Some(B4), true, &mut engine),
            Transition::Retrigger { from: A4, to: B4 }
        );
        assert_eq!(
            engine.calls(),
            vec![
                Call::ReleaseAll,
                Call::Attack(B4, 1.0),
                Call::Attack(MusicalNote::new(59), 0.4)
            ]
        );
        assert_eq!(trigger.state(), TriggerState::Sounding(B4));
    }

    #[test]
    fn test_confirm_ticks() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig {
            confirm_ticks: 3,
            ..Default::default()
        });

        assert_eq!(trigger.update(0.05, Some(A4), false, &mut engine), Transition::None);
        assert_eq!(trigger.update(0.05, Some(A4), false, &mut engine), Transition::None);
        // A different note restarts the count.
        assert_eq!(trigger.update(0.05, Some(B4), false, &mut engine), Transition::None);
        assert_eq!(trigger.update(0.05, Some(A4), false, &mut engine), Transition::None);
        assert_eq!(trigger.update(0.05, Some(A4), false, &mut engine), Transition::None);
        assert!(engine.calls().is_empty());
        assert_eq!(
            trigger.update(0.05, Some(A4), false, &mut engine),
            Transition::Attack(A4)
        );
    }

    #[test]
    fn test_non_finite_loudness_degrades_to_silence() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        trigger.update(0.05, Some(A4), false, &mut engine);
        engine.clear();
        assert_eq!(
            trigger.update(f32::NAN, Some(A4), false, &mut engine),
            Transition::Release(A4)
        );
        assert_eq!(engine.calls(), vec![Call::ReleaseAll]);
    }

    #[test]
    fn test_reset() {
        let mut engine = MockEngine::new();
        let mut trigger = NoteTrigger::new(TriggerConfig::default());

        assert_eq!(trigger.reset(&mut engine), Transition::None);
        trigger.update(0.05, Some(A4), false, &mut engine);
        assert_eq!(trigger.reset(&mut engine), Transition::Release(A4));
        assert_eq!(trigger.state(), TriggerState::Silent);
    }
}
