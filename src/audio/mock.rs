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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{AudioFrame, Render, SignalSource};

/// Block size the mock output renders in.
const MOCK_BLOCK_FRAMES: usize = 512;

struct Cursor {
    samples: Vec<f32>,
    position: usize,
}

/// A mock signal source. Serves successive windows of a prepared signal,
/// advancing by `hop` samples per frame. A hop of zero repeats the same window.
pub struct Source {
    cursor: Mutex<Cursor>,
    sample_rate: u32,
    frame_size: usize,
    hop: usize,
}

impl Source {
    /// Creates a source over the given mono signal.
    pub fn new(samples: Vec<f32>, sample_rate: u32, frame_size: usize, hop: usize) -> Source {
        Source {
            cursor: Mutex::new(Cursor {
                samples,
                position: 0,
            }),
            sample_rate,
            frame_size,
            hop,
        }
    }

    /// Creates a source that always returns silence.
    pub fn silent(frame_size: usize, sample_rate: u32) -> Source {
        Source::new(vec![0.0; frame_size], sample_rate, frame_size, 0)
    }

    /// Replaces the signal and rewinds to its start.
    pub fn load(&self, samples: Vec<f32>) {
        let mut cursor = self.cursor.lock();
        cursor.samples = samples;
        cursor.position = 0;
    }

    /// Returns true once there are not enough samples left for another frame.
    pub fn is_exhausted(&self) -> bool {
        let cursor = self.cursor.lock();
        cursor.position + self.frame_size > cursor.samples.len()
    }

    /// Returns the position of the next frame, in samples.
    pub fn position(&self) -> usize {
        self.cursor.lock().position
    }
}

impl SignalSource for Source {
    fn current_frame(&self) -> Option<AudioFrame> {
        let mut cursor = self.cursor.lock();
        let start = cursor.position;
        let end = start + self.frame_size;
        if end > cursor.samples.len() {
            return None;
        }

        let frame = AudioFrame::new(cursor.samples[start..end].to_vec(), self.sample_rate);
        cursor.position += self.hop;
        Some(frame)
    }
}

/// A mock output. Pulls blocks from the renderer at roughly real-time pace on
/// a background thread and discards them.
pub struct Output {
    name: String,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    rendered: Arc<AtomicU64>,
    join: Option<thread::JoinHandle<()>>,
}

impl Output {
    /// Starts the mock output.
    pub fn start(name: &str, sample_rate: u32, renderer: Arc<dyn Render>) -> Output {
        let running = Arc::new(AtomicBool::new(true));
        let rendered = Arc::new(AtomicU64::new(0));
        let block_duration =
            Duration::from_secs_f64(MOCK_BLOCK_FRAMES as f64 / sample_rate.max(1) as f64);

        let join = {
            let running = running.clone();
            let rendered = rendered.clone();
            let name = name.to_string();
            thread::spawn(move || {
                let span = span!(Level::INFO, "output (mock)");
                let _enter = span.enter();
                info!(device = name, sample_rate, "Mock output started.");

                let mut block = vec![0.0f32; MOCK_BLOCK_FRAMES];
                while running.load(Ordering::Relaxed) {
                    renderer.render(&mut block);
                    rendered.fetch_add(block.len() as u64, Ordering::Relaxed);
                    thread::sleep(block_duration);
                }
            })
        };

        Output {
            name: name.to_string(),
            sample_rate,
            running,
            rendered,
            join: Some(join),
        }
    }

    /// Returns the number of samples rendered so far.
    #[cfg(test)]
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

impl super::OutputStream for Output {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::eventually;

    struct Counter(AtomicU64);

    impl Render for Counter {
        fn render(&self, output: &mut [f32]) {
            output.fill(0.0);
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_source_windows() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let source = Source::new(samples, 44100, 4, 3);

        assert_eq!(source.current_frame().unwrap().samples(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(source.current_frame().unwrap().samples(), &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(source.current_frame().unwrap().samples(), &[6.0, 7.0, 8.0, 9.0]);
        assert!(source.is_exhausted());
        assert_eq!(source.current_frame(), None);

        source.load(vec![1.0; 4]);
        assert!(!source.is_exhausted());
        assert_eq!(source.current_frame().unwrap().samples(), &[1.0; 4]);
    }

    #[test]
    fn test_silent_source_repeats() {
        let source = Source::silent(8, 48000);
        for _ in 0..5 {
            let frame = source.current_frame().unwrap();
            assert_eq!(frame.len(), 8);
            assert_eq!(frame.sample_rate(), 48000);
        }
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn test_output_pulls_blocks() {
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        let output = Output::start("mock-out", 44100, counter.clone());

        eventually(
            || counter.0.load(Ordering::Relaxed) >= 3,
            "Mock output never rendered",
        );
        assert!(output.rendered() >= 3 * MOCK_BLOCK_FRAMES as u64);
        drop(output);

        let after_drop = counter.0.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.0.load(Ordering::Relaxed), after_drop);
    }
}
