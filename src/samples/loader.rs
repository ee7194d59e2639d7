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

//! Sample loading and caching for instrument zones.
//!
//! Samples are decoded entirely into memory, down-mixed to mono and converted
//! to the output sample rate so voices never touch the disk.

use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

/// A loaded mono sample that can be played back.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone)]
pub struct LoadedSample {
    data: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl LoadedSample {
    /// Wraps mono samples already at the given rate.
    pub fn from_mono(data: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            data: Arc::new(data),
            sample_rate,
        }
    }

    /// Returns the sample data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the sample rate of the data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample holds no audio.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.data.len() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("samples", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, LoadedSample>,
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample from a file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, Box<dyn Error>> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        info!(path = ?path, "Loading sample into memory");

        let (interleaved, channel_count, source_sample_rate) = decode_file(path)
            .map_err(|e| -> Box<dyn Error> {
                format!("Failed to load sample {}: {}", path.display(), e).into()
            })?;
        let mono = downmix(&interleaved, channel_count);

        let samples = if source_sample_rate != self.target_sample_rate {
            info!(
                source_rate = source_sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            transcode(&mono, source_sample_rate, self.target_sample_rate)
        } else {
            mono
        };

        let loaded = LoadedSample::from_mono(samples, self.target_sample_rate);
        info!(
            path = ?path,
            channels = channel_count,
            sample_rate = self.target_sample_rate,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }

    /// Returns the rate samples are converted to.
    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes an audio file with symphonia. Returns interleaved samples, the
/// channel count and the sample rate.
fn decode_file(path: &Path) -> Result<(Vec<f32>, usize, u32), Box<dyn Error>> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let (track_id, params) = {
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or("no audio track found")?;
        (track.id, track.codec_params.clone())
    };

    let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;
    let mut sample_rate = params.sample_rate;
    let mut channels = params.channels.map(|c| c.count());
    let mut samples = Vec::new();

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let sample_rate = sample_rate.ok_or("sample rate not specified")?;
    let channels = channels.filter(|c| *c > 0).ok_or("channel count not specified")?;
    Ok((samples, channels, sample_rate))
}

/// Averages interleaved channels down to mono.
fn downmix(samples: &[f32], channel_count: usize) -> Vec<f32> {
    if channel_count <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channel_count)
        .map(|frame| frame.iter().sum::<f32>() / channel_count as f32)
        .collect()
}

/// Converts mono samples from one sample rate to another using linear
/// interpolation.
fn transcode(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let target_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..target_len)
        .map(|i| {
            let source_pos = i as f64 / ratio;
            let index = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            let s0 = samples.get(index).copied().unwrap_or(0.0);
            let s1 = samples.get(index + 1).copied().unwrap_or(s0);
            s0 + (s1 - s0) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sine, write_wav};

    #[test]
    fn test_transcode_samples() {
        let source = sine(440.0, 1.0, 44100, 4410);
        let result = transcode(&source, 44100, 48000);

        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
        assert!(result.iter().all(|s| s.abs() <= 1.0 + 1e-6));
    }

    #[test]
    fn test_downmix() {
        let stereo = vec![1.0f32, -1.0, 0.5, 0.5, 0.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.0, 0.5, 0.5]);
        assert_eq!(downmix(&stereo, 1), stereo);
    }

    #[test]
    fn test_load_wav_is_mono_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = sine(220.0, 0.5, 22050, 2205);
        let stereo: Vec<f32> = tone.iter().flat_map(|s| [*s, *s]).collect();
        write_wav(&path, &stereo, 2, 22050).unwrap();

        let mut loader = SampleLoader::new(44100);
        let sample = loader.load(&path).unwrap();
        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(sample.len(), 4410);
        assert!((sample.duration().as_secs_f64() - 0.1).abs() < 1e-3);
        assert!((sample.data()[2] - tone[1]).abs() < 1e-4);

        let cached = loader.load(&path).unwrap();
        assert!(Arc::ptr_eq(&sample.data, &cached.data));
        assert_eq!(loader.total_memory_usage(), 4410 * 4);
    }

    #[test]
    fn test_load_missing_file() {
        let mut loader = SampleLoader::new(44100);
        let err = loader.load(Path::new("/nonexistent/sample.wav")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sample.wav"));
    }
}
