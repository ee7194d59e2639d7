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

//! Captures the output mix into encoded audio.

use std::{error::Error, fmt, io::Cursor, time::Duration};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tracing::{error, info, warn};

/// A finished recording.
#[derive(Clone, PartialEq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    sample_rate: u32,
    samples: usize,
}

impl EncodedAudio {
    /// Returns the encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the file extension matching the encoding.
    pub fn extension(&self) -> &'static str {
        "wav"
    }

    /// Returns the length of the recording.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples as f64 / self.sample_rate.max(1) as f64)
    }
}

impl fmt::Debug for EncodedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedAudio")
            .field("bytes", &self.bytes.len())
            .field("duration_ms", &self.duration().as_millis())
            .finish()
    }
}

/// Records audio on demand. Independent of the scheduler loop.
pub trait CaptureRecorder: Send + Sync {
    /// Starts recording. Has no effect if already recording.
    fn start(&self);

    /// Stops recording and returns the encoded audio. Returns None if the
    /// recorder was not recording.
    fn stop(&self) -> Option<EncodedAudio>;

    /// Returns true while recording.
    fn is_recording(&self) -> bool;
}

/// Records the output mix as a 32-bit float mono WAV held in memory.
pub struct WavRecorder {
    sample_rate: u32,
    /// Captured samples while recording, None otherwise.
    buffer: Mutex<Option<Vec<f32>>>,
}

impl WavRecorder {
    pub fn new(sample_rate: u32) -> WavRecorder {
        WavRecorder {
            sample_rate,
            buffer: Mutex::new(None),
        }
    }

    /// Appends output samples if recording. Called from the output thread.
    pub fn capture(&self, samples: &[f32]) {
        if let Some(buffer) = self.buffer.lock().as_mut() {
            buffer.extend_from_slice(samples);
        }
    }

    fn encode(&self, samples: &[f32]) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(
                &mut cursor,
                WavSpec {
                    channels: 1,
                    sample_rate: self.sample_rate,
                    bits_per_sample: 32,
                    sample_format: SampleFormat::Float,
                },
            )?;
            for sample in samples {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

impl CaptureRecorder for WavRecorder {
    fn start(&self) {
        let mut buffer = self.buffer.lock();
        if buffer.is_some() {
            warn!("Already recording");
            return;
        }
        *buffer = Some(Vec::new());
        info!("Recording started");
    }

    fn stop(&self) -> Option<EncodedAudio> {
        let samples = self.buffer.lock().take()?;
        match self.encode(&samples) {
            Ok(bytes) => {
                let audio = EncodedAudio {
                    bytes,
                    sample_rate: self.sample_rate,
                    samples: samples.len(),
                };
                info!(duration_ms = audio.duration().as_millis(), "Recording stopped");
                Some(audio)
            }
            Err(e) => {
                error!(err = %e, "Unable to encode recording");
                None
            }
        }
    }

    fn is_recording(&self) -> bool {
        self.buffer.lock().is_some()
    }
}
