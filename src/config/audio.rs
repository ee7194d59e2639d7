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

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_FRAME_SIZE: usize = 1024;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The capture device. Names starting with "mock" select a mock device.
    input_device: Option<String>,

    /// The playback device.
    output_device: Option<String>,

    /// Sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Samples per analysed frame (default: 1024).
    frame_size: Option<usize>,
}

impl Audio {
    /// New will create a new Audio configuration using the given device for
    /// both capture and playback.
    pub fn new(device: &str) -> Audio {
        Audio {
            input_device: Some(device.to_string()),
            output_device: Some(device.to_string()),
            sample_rate: None,
            frame_size: None,
        }
    }

    /// Returns the capture device name.
    pub fn input_device(&self) -> &str {
        self.input_device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the playback device name.
    pub fn output_device(&self) -> &str {
        self.output_device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the number of samples per frame (default: 1024).
    pub fn frame_size(&self) -> usize {
        self.frame_size.unwrap_or(DEFAULT_FRAME_SIZE)
    }
}
