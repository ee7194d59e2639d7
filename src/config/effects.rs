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
use serde::Deserialize;

use super::error::ConfigError;

/// A YAML representation of the output effect chain.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Effects {
    /// Soft-clip drive amount in [0, 1]. Omitted means a dry output.
    drive: Option<f32>,
}

impl Effects {
    /// Creates an effects configuration with the given drive.
    pub fn new(drive: Option<f32>) -> Effects {
        Effects { drive }
    }

    /// Returns the drive amount, if any.
    pub fn drive(&self) -> Option<f32> {
        self.drive
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.drive {
            Some(drive) if !(0.0..=1.0).contains(&drive) => Err(ConfigError::Invalid(format!(
                "effects.drive must be in [0, 1], got {}",
                drive
            ))),
            _ => Ok(()),
        }
    }
}
