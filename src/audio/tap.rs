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

//! Keeps the most recent window of captured audio for frame snapshots.

use parking_lot::Mutex;

use super::{AudioFrame, SignalSource};

struct Window {
    /// Circular storage of the last `len` mono samples.
    samples: Vec<f32>,
    /// Next write position.
    write_pos: usize,
}

/// A waveform tap fed by a capture callback. Reading returns the last
/// `frame_size` samples in chronological order, zero-padded until the
/// window fills up.
pub struct FrameTap {
    window: Mutex<Window>,
    sample_rate: u32,
}

impl FrameTap {
    /// Creates a new tap holding `frame_size` samples.
    pub fn new(frame_size: usize, sample_rate: u32) -> FrameTap {
        FrameTap {
            window: Mutex::new(Window {
                samples: vec![0.0; frame_size],
                write_pos: 0,
            }),
            sample_rate,
        }
    }

    /// Writes interleaved samples, down-mixing them to mono.
    pub fn write_interleaved(&self, data: &[f32], channels: usize) {
        let channels = channels.max(1);
        let mut window = self.window.lock();
        let len = window.samples.len();
        if len == 0 {
            return;
        }

        for frame in data.chunks(channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            let pos = window.write_pos;
            window.samples[pos] = mono;
            window.write_pos = (pos + 1) % len;
        }
    }

    /// Returns the window in chronological order.
    pub fn snapshot(&self) -> AudioFrame {
        let window = self.window.lock();
        let (newer, older) = window.samples.split_at(window.write_pos);
        let mut samples = Vec::with_capacity(window.samples.len());
        samples.extend_from_slice(older);
        samples.extend_from_slice(newer);
        AudioFrame::new(samples, self.sample_rate)
    }
}

impl SignalSource for FrameTap {
    fn current_frame(&self) -> Option<AudioFrame> {
        Some(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_chronological() {
        let tap = FrameTap::new(4, 44100);
        tap.write_interleaved(&[1.0, 2.0, 3.0], 1);
        assert_eq!(tap.snapshot().samples(), &[0.0, 1.0, 2.0, 3.0]);

        tap.write_interleaved(&[4.0, 5.0, 6.0], 1);
        assert_eq!(tap.snapshot().samples(), &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(tap.snapshot().sample_rate(), 44100);
    }

    #[test]
    fn test_downmix() {
        let tap = FrameTap::new(2, 48000);
        tap.write_interleaved(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(tap.snapshot().samples(), &[0.5, 0.5]);
    }

    #[test]
    fn test_large_writes_keep_latest() {
        let tap = FrameTap::new(3, 44100);
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        tap.write_interleaved(&data, 1);
        assert_eq!(tap.current_frame().unwrap().samples(), &[7.0, 8.0, 9.0]);
    }
}
