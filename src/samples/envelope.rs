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

//! Attack/release amplitude envelopes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Levels below this are treated as silence.
const SILENCE: f32 = 1.0e-4;

/// The shape of the attack and release segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    Linear,
    #[default]
    Exponential,
}

/// Envelope parameters shared by every voice of an instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack: Duration,
    pub release: Duration,
    pub curve: Curve,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            attack: Duration::from_millis(5),
            release: Duration::from_secs(1),
            curve: Curve::Exponential,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Attack,
    Sustain,
    Release,
    Done,
}

/// Per-voice envelope progress.
#[derive(Clone, Debug)]
pub struct EnvelopeState {
    stage: Stage,
    level: f32,
    curve: Curve,
    attack_samples: f32,
    release_samples: f32,
    /// Per-sample decrement for a linear release, fixed when the release starts.
    release_step: f32,
}

impl EnvelopeState {
    /// Starts a new envelope at zero level.
    pub fn new(envelope: &Envelope, sample_rate: u32) -> EnvelopeState {
        let attack_samples = (envelope.attack.as_secs_f32() * sample_rate as f32).max(0.0);
        let release_samples = (envelope.release.as_secs_f32() * sample_rate as f32).max(0.0);
        let (stage, level) = if attack_samples < 1.0 {
            (Stage::Sustain, 1.0)
        } else {
            (Stage::Attack, 0.0)
        };

        EnvelopeState {
            stage,
            level,
            curve: envelope.curve,
            attack_samples,
            release_samples,
            release_step: 0.0,
        }
    }

    /// Moves the envelope into its release stage from the current level.
    pub fn release(&mut self) {
        if matches!(self.stage, Stage::Release | Stage::Done) {
            return;
        }

        if self.release_samples < 1.0 || self.level <= SILENCE {
            self.level = 0.0;
            self.stage = Stage::Done;
            return;
        }

        self.release_step = self.level / self.release_samples;
        self.stage = Stage::Release;
    }

    /// Returns true while the envelope is still producing sound.
    pub fn is_active(&self) -> bool {
        self.stage != Stage::Done
    }

    /// Returns true once the release stage has started.
    pub fn is_releasing(&self) -> bool {
        matches!(self.stage, Stage::Release | Stage::Done)
    }

    /// Advances by one sample and returns the gain to apply.
    pub fn next_level(&mut self) -> f32 {
        match self.stage {
            Stage::Attack => {
                self.level = match self.curve {
                    Curve::Linear => self.level + 1.0 / self.attack_samples,
                    Curve::Exponential => {
                        1.0 - (1.0 - self.level) * decay_coefficient(self.attack_samples)
                    }
                };
                if self.level >= 1.0 - SILENCE {
                    self.level = 1.0;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level = match self.curve {
                    Curve::Linear => self.level - self.release_step,
                    Curve::Exponential => self.level * decay_coefficient(self.release_samples),
                };
                if self.level <= SILENCE {
                    self.level = 0.0;
                    self.stage = Stage::Done;
                }
            }
            Stage::Done => self.level = 0.0,
        }

        self.level = self.level.clamp(0.0, 1.0);
        self.level
    }
}

/// The per-sample multiplier that decays a unit gap down to `SILENCE` in the
/// given number of samples.
fn decay_coefficient(samples: f32) -> f32 {
    (SILENCE.ln() / samples.max(1.0)).exp()
}
