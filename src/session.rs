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
    error::Error,
    fmt, fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use tracing::{debug, info};

use crate::{recorder::EncodedAudio, tracker::ScaleFilter};

/// A completed recording. Immutable once created.
#[derive(Clone, Debug)]
pub struct Session {
    id: u64,
    started_at: SystemTime,
    audio: EncodedAudio,
    instrument: String,
    bpm: u32,
    scale: ScaleFilter,
}

/// The metadata written next to an exported recording.
#[derive(Serialize)]
struct Metadata<'a> {
    id: u64,
    started_at_ms: u128,
    duration_ms: u128,
    instrument: &'a str,
    bpm: u32,
    scale: ScaleFilter,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn audio(&self) -> &EncodedAudio {
        &self.audio
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn scale(&self) -> ScaleFilter {
        self.scale
    }

    fn metadata(&self) -> Metadata<'_> {
        Metadata {
            id: self.id,
            started_at_ms: self
                .started_at
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_millis(),
            duration_ms: self.audio.duration().as_millis(),
            instrument: &self.instrument,
            bpm: self.bpm,
            scale: self.scale,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {}bpm {:.1}s",
            self.id,
            self.instrument,
            self.scale,
            self.bpm,
            self.audio.duration().as_secs_f32()
        )
    }
}

/// The in-memory list of completed sessions, oldest first.
#[derive(Debug, Default)]
pub struct SessionLog {
    sessions: Vec<Session>,
    next_id: u64,
}

impl SessionLog {
    pub fn new() -> SessionLog {
        SessionLog {
            sessions: Vec::new(),
            next_id: 1,
        }
    }

    /// Appends a session for a finished recording and returns its id.
    pub fn push(
        &mut self,
        started_at: SystemTime,
        audio: EncodedAudio,
        instrument: &str,
        bpm: u32,
        scale: ScaleFilter,
    ) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        info!(id, instrument, bpm, %scale, "Session saved");
        self.sessions.push(Session {
            id,
            started_at,
            audio,
            instrument: instrument.to_string(),
            bpm,
            scale,
        });
        id
    }

    /// Returns all sessions, oldest first.
    pub fn list(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: u64) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Deletes a session. Returns false if no session has the id.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        let removed = self.sessions.len() != before;
        if removed {
            info!(id, "Session deleted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Writes the session's audio and a JSON metadata file into the directory,
    /// creating it if needed. Returns the audio file path.
    pub fn export(&self, id: u64, dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
        let session = self
            .get(id)
            .ok_or_else(|| format!("no session with id {}", id))?;

        fs::create_dir_all(dir)?;
        let audio_path = dir.join(format!("session-{}.{}", id, session.audio.extension()));
        fs::write(&audio_path, session.audio.bytes())?;

        let metadata_path = dir.join(format!("session-{}.json", id));
        fs::write(
            &metadata_path,
            serde_json::to_string_pretty(&session.metadata())?,
        )?;
        debug!(path = ?metadata_path, "Wrote session metadata");

        info!(id, path = ?audio_path, "Session exported");
        Ok(audio_path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::recorder::{CaptureRecorder, WavRecorder};

    fn recording(samples: &[f32]) -> EncodedAudio {
        let recorder = WavRecorder::new(1000);
        recorder.start();
        recorder.capture(samples);
        recorder.stop().unwrap()
    }

    #[test]
    fn test_push_list_remove() {
        let mut log = SessionLog::new();
        assert!(log.is_empty());

        let first = log.push(
            SystemTime::now(),
            recording(&[0.1; 500]),
            "piano",
            120,
            ScaleFilter::Major,
        );
        let second = log.push(
            SystemTime::now(),
            recording(&[0.1; 300]),
            "strings",
            90,
            ScaleFilter::Minor,
        );
        assert_eq!((first, second), (1, 2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.list()[0].instrument(), "piano");
        assert_eq!(log.get(2).unwrap().scale(), ScaleFilter::Minor);
        assert_eq!(log.get(2).unwrap().to_string(), "#2 strings MIN 90bpm 0.3s");

        assert!(log.remove(1));
        assert!(!log.remove(1));
        assert_eq!(log.len(), 1);

        // Ids are never reused.
        let third = log.push(
            SystemTime::now(),
            recording(&[]),
            "piano",
            120,
            ScaleFilter::Chromatic,
        );
        assert_eq!(third, 3);
    }

    #[test]
    fn test_export() {
        let dir = tempfile::tempdir().unwrap();
        let export_dir = dir.path().join("out");

        let mut log = SessionLog::new();
        let started_at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let id = log.push(
            started_at,
            recording(&[0.5; 1500]),
            "cello",
            100,
            ScaleFilter::Pentatonic,
        );

        let path = log.export(id, &export_dir).unwrap();
        assert_eq!(path, export_dir.join("session-1.wav"));

        let reader = hound::WavReader::new(Cursor::new(fs::read(&path).unwrap())).unwrap();
        assert_eq!(reader.len(), 1500);

        let metadata: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(export_dir.join("session-1.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(metadata["id"], 1);
        assert_eq!(metadata["started_at_ms"], 1_700_000_000_123u64);
        assert_eq!(metadata["duration_ms"], 1500);
        assert_eq!(metadata["instrument"], "cello");
        assert_eq!(metadata["bpm"], 100);
        assert_eq!(metadata["scale"], "pentatonic");
    }

    #[test]
    fn test_export_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new();
        let err = log.export(7, dir.path()).unwrap_err();
        assert!(err.to_string().contains("7"));
    }
}
