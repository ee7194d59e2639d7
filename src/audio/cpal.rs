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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SizedSample,
};
use tracing::{error, info, span, Level};

use super::{AudioError, AudioFrame, DeviceInfo, FrameTap, Render, SignalSource};
use crate::config;

/// Name that selects the host's default device.
const DEFAULT_DEVICE: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Owns the thread a cpal stream lives on. cpal streams are not Send, so each
/// one is built, played and dropped on its own thread.
struct StreamThread {
    shutdown: Option<crossbeam_channel::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl StreamThread {
    /// Spawns the stream thread and waits until the stream is playing.
    fn spawn<F>(label: &'static str, build: F) -> Result<StreamThread, Box<dyn Error>>
    where
        F: FnOnce() -> Result<cpal::Stream, Box<dyn Error>> + Send + 'static,
    {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let join = thread::spawn(move || {
            let span = span!(Level::INFO, "stream", direction = label);
            let _enter = span.enter();

            let stream = match build() {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::PlayStream(e).to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            info!("Stream started.");

            // Blocks until the owner drops the sender.
            let _ = shutdown_rx.recv();
            drop(stream);
            info!("Stream stopped.");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(StreamThread {
                shutdown: Some(shutdown_tx),
                join: Some(join),
            }),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = join.join();
                Err(Box::new(AudioError::StreamClosed))
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// A capture stream feeding a frame tap.
pub struct InputStream {
    name: String,
    tap: Arc<FrameTap>,
    _stream: StreamThread,
}

impl InputStream {
    /// Opens the configured input device.
    pub fn open(config: &config::Audio) -> Result<InputStream, Box<dyn Error>> {
        let name = config.input_device().to_string();
        let sample_rate = config.sample_rate();
        let tap = Arc::new(FrameTap::new(config.frame_size(), sample_rate));

        let stream = {
            let name = name.clone();
            let tap = tap.clone();
            StreamThread::spawn("input", move || {
                let device = find_device(&name, Direction::Input)?;
                let default_config = device.default_input_config()?;
                let stream_config = cpal::StreamConfig {
                    channels: default_config.channels(),
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream = match default_config.sample_format() {
                    cpal::SampleFormat::F32 => build_input::<f32>(&device, &stream_config, tap)?,
                    cpal::SampleFormat::I16 => build_input::<i16>(&device, &stream_config, tap)?,
                    cpal::SampleFormat::I32 => build_input::<i32>(&device, &stream_config, tap)?,
                    cpal::SampleFormat::U16 => build_input::<u16>(&device, &stream_config, tap)?,
                    format => return Err(AudioError::UnsupportedFormat(format.to_string()).into()),
                };
                Ok(stream)
            })?
        };

        info!(device = name, sample_rate, "Opened input device.");
        Ok(InputStream {
            name,
            tap,
            _stream: stream,
        })
    }
}

impl SignalSource for InputStream {
    fn current_frame(&self) -> Option<AudioFrame> {
        self.tap.current_frame()
    }
}

impl fmt::Display for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (CPAL input)", self.name)
    }
}

/// A playback stream pulling mono audio from a renderer.
pub struct OutputStream {
    name: String,
    sample_rate: u32,
    _stream: StreamThread,
}

impl OutputStream {
    /// Opens the configured output device.
    pub fn open(
        config: &config::Audio,
        renderer: Arc<dyn Render>,
    ) -> Result<OutputStream, Box<dyn Error>> {
        let name = config.output_device().to_string();
        let sample_rate = config.sample_rate();

        let stream = {
            let name = name.clone();
            StreamThread::spawn("output", move || {
                let device = find_device(&name, Direction::Output)?;
                let default_config = device.default_output_config()?;
                let stream_config = cpal::StreamConfig {
                    channels: default_config.channels(),
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream = match default_config.sample_format() {
                    cpal::SampleFormat::F32 => {
                        build_output::<f32>(&device, &stream_config, renderer)?
                    }
                    cpal::SampleFormat::I16 => {
                        build_output::<i16>(&device, &stream_config, renderer)?
                    }
                    cpal::SampleFormat::I32 => {
                        build_output::<i32>(&device, &stream_config, renderer)?
                    }
                    cpal::SampleFormat::U16 => {
                        build_output::<u16>(&device, &stream_config, renderer)?
                    }
                    format => return Err(AudioError::UnsupportedFormat(format.to_string()).into()),
                };
                Ok(stream)
            })?
        };

        info!(device = name, sample_rate, "Opened output device.");
        Ok(OutputStream {
            name,
            sample_rate,
            _stream: stream,
        })
    }
}

impl super::OutputStream for OutputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (CPAL output)", self.name)
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tap: Arc<FrameTap>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    Ok(device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|sample| sample.to_sample::<f32>()));
            tap.write_interleaved(&scratch, channels);
        },
        |err| error!(err = err.to_string(), "Input stream error"),
        None,
    )?)
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    renderer: Arc<dyn Render>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);
    let mut mono: Vec<f32> = Vec::new();
    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            mono.resize(data.len() / channels, 0.0);
            renderer.render(&mut mono);
            for (frame, sample) in data.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(T::from_sample(*sample));
            }
        },
        |err| error!(err = err.to_string(), "Output stream error"),
        None,
    )?)
}

/// Finds a device by name across all hosts. "default" selects the default
/// host's default device.
fn find_device(name: &str, direction: Direction) -> Result<cpal::Device, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    if name == DEFAULT_DEVICE {
        let host = cpal::default_host();
        let device = match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        };
        return device
            .ok_or_else(|| AudioError::NoDevice(direction.label(), name.to_string()).into());
    }

    for host_id in cpal::available_hosts() {
        let host = cpal::host_from_id(host_id)?;
        let devices = match direction {
            Direction::Input => host.input_devices(),
            Direction::Output => host.output_devices(),
        };
        let devices = match devices {
            Ok(devices) => devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in devices {
            if device.name().map(|n| n.trim() == name).unwrap_or(false) {
                return Ok(device);
            }
        }
    }

    Err(Box::new(AudioError::NoDevice(
        direction.label(),
        name.to_string(),
    )))
}

/// Lists all devices across hosts with their maximum channel counts.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices: Vec<DeviceInfo> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let input_channels = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            let output_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            if input_channels == 0 && output_channels == 0 {
                continue;
            }

            devices.push(DeviceInfo {
                name: device.name()?,
                host: host_id.name().to_string(),
                input_channels,
                output_channels,
            });
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}
