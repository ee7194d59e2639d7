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
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod cpal;
pub mod mock;
pub mod tap;

pub use tap::FrameTap;

/// Errors raised while opening or running audio devices.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no {0} device found with name {1}")]
    NoDevice(&'static str, String),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[error("device stream stopped before it was ready")]
    StreamClosed,

    #[error("unable to build stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("unable to read default stream config: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("unable to read device name: {0}")]
    DeviceName(#[from] ::cpal::DeviceNameError),
}

/// A fixed-size snapshot of mono audio along with the rate it was captured at.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    /// Creates a new frame.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate,
        }
    }

    /// Returns the samples in the frame.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the sample rate the frame was captured at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of samples in the frame.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Supplies the most recent audio frame on demand. Must never block.
pub trait SignalSource: Send + Sync {
    /// Returns the current frame, or None if no frame is available.
    fn current_frame(&self) -> Option<AudioFrame>;
}

/// Produces mono output audio. Called from the output stream's thread.
pub trait Render: Send + Sync {
    /// Fills the buffer with the next block of mono samples.
    fn render(&self, output: &mut [f32]);
}

/// A running output stream. Dropping it stops playback.
pub trait OutputStream: fmt::Display + Send {
    /// Returns the sample rate the stream runs at.
    fn sample_rate(&self) -> u32;
}

/// Describes a device known to the audio host.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub input_channels: u16,
    pub output_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Inputs={}, Outputs={}) ({})",
            self.name, self.input_channels, self.output_channels, self.host
        )
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    cpal::list_devices()
}

/// Opens the configured capture device as a signal source.
pub fn open_input(config: &config::Audio) -> Result<Arc<dyn SignalSource>, Box<dyn Error>> {
    let device = config.input_device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Source::silent(
            config.frame_size(),
            config.sample_rate(),
        )));
    }

    Ok(Arc::new(cpal::InputStream::open(config)?))
}

/// Opens the configured playback device, pulling audio from the renderer.
pub fn open_output(
    config: &config::Audio,
    renderer: Arc<dyn Render>,
) -> Result<Box<dyn OutputStream>, Box<dyn Error>> {
    let device = config.output_device();
    if device.starts_with("mock") {
        return Ok(Box::new(mock::Output::start(
            device,
            config.sample_rate(),
            renderer,
        )));
    }

    Ok(Box::new(cpal::OutputStream::open(config, renderer)?))
}
