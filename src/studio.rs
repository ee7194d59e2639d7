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

//! Owns the devices, the scheduler task, the recorder and the session log for a
//! live session, and applies controller events to them.

use std::{error::Error, path::PathBuf, sync::Arc, time::SystemTime};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    audio::{self, OutputStream, Render},
    config,
    controller::Event,
    effects::{self, SignalChain},
    recorder::{CaptureRecorder, WavRecorder},
    samples::SamplerEngine,
    scheduler::{EngineContext, LoopHandle, Scheduler, Snapshot},
    session::SessionLog,
    settings::{Settings, SharedSettings},
    tracker::TriggerState,
};

/// Width of the status loudness meter.
const METER_WIDTH: usize = 20;

/// Lowest level shown on the meter, in dBFS.
const METER_FLOOR_DB: f32 = -60.0;

/// The output mix: sampler voices through the signal chain, captured by the
/// recorder on the way out.
struct Mixdown {
    sampler: Arc<dyn Render>,
    chain: Box<dyn SignalChain>,
    recorder: Arc<WavRecorder>,
}

impl Render for Mixdown {
    fn render(&self, output: &mut [f32]) {
        self.sampler.render(output);
        self.chain.process(output);
        self.recorder.capture(output);
    }
}

/// A running live session.
pub struct Studio {
    settings: SharedSettings,
    instruments: Vec<String>,
    recorder: Arc<WavRecorder>,
    recording_started: Option<SystemTime>,
    sessions: SessionLog,
    bpm: u32,
    export_dir: PathBuf,
    handle: LoopHandle,
    scheduler: Option<JoinHandle<Scheduler>>,
    presenter: JoinHandle<()>,
    snapshots: watch::Receiver<Snapshot>,
    _output: Box<dyn OutputStream>,
}

impl Studio {
    /// Opens the devices, loads instruments and starts the scheduler loop.
    /// Must be called within a tokio runtime. Device failures are fatal.
    pub fn start(config: &config::Studio) -> Result<Studio, Box<dyn Error>> {
        let sample_rate = config.audio().sample_rate();
        let interval = config.tracker().tick_interval()?;

        let engine = SamplerEngine::from_config(config, sample_rate)?;
        let instruments = engine.instrument_ids();
        let chain = effects::from_config(config.effects());
        info!(chain = chain.name(), "Signal chain selected");

        let recorder = Arc::new(WavRecorder::new(sample_rate));
        let mixdown = Arc::new(Mixdown {
            sampler: engine.renderer(),
            chain,
            recorder: recorder.clone(),
        });

        let output = audio::open_output(config.audio(), mixdown).map_err(|e| {
            error!(err = %e, device = config.audio().output_device(), "Unable to open output");
            e
        })?;
        let source = audio::open_input(config.audio()).map_err(|e| {
            error!(err = %e, device = config.audio().input_device(), "Unable to open input");
            e
        })?;
        info!(output = %output, "Audio devices opened");

        let settings = SharedSettings::new(Settings::from_config(config));
        let (mut scheduler, snapshots) = Scheduler::new(
            config.tracker().pitch(),
            config.tracker().trigger(),
            settings.clone(),
        );
        scheduler.set_envelope(config.session().envelope()?);
        scheduler.attach(EngineContext {
            source,
            voice: Box::new(engine),
        });

        let handle = LoopHandle::new();
        let presenter = tokio::spawn(
            Studio::present(scheduler.subscribe()).instrument(info_span!("presenter")),
        );
        let scheduler = tokio::spawn(
            scheduler
                .run(handle.clone(), interval)
                .instrument(info_span!("scheduler")),
        );

        info!(settings = %settings.snapshot(), "Studio started");
        Ok(Studio {
            settings,
            instruments,
            recorder,
            recording_started: None,
            sessions: SessionLog::new(),
            bpm: config.session().bpm(),
            export_dir: config.base_path().join(config.session().export_dir()),
            handle,
            scheduler: Some(scheduler),
            presenter,
            snapshots,
            _output: output,
        })
    }

    /// Returns the settings shared with the scheduler loop.
    pub fn settings(&self) -> SharedSettings {
        self.settings.clone()
    }

    /// Returns the handle of the scheduler loop.
    pub fn loop_handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Returns the saved sessions.
    pub fn sessions(&self) -> &SessionLog {
        &self.sessions
    }

    /// Applies a controller event. Quitting is handled by `stop`.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::SetScale(scale) => self.settings.set_scale(scale),
            Event::SetEpic(epic) => self.settings.set_epic(epic),
            Event::SetInstrument(id) => {
                if self.instruments.contains(&id) {
                    self.settings.set_instrument(&id);
                } else {
                    warn!(
                        instrument = id,
                        available = self.instruments.join(", "),
                        "Unknown instrument"
                    );
                }
            }
            Event::Record => {
                if !self.recorder.is_recording() {
                    self.recorder.start();
                    self.recording_started = Some(SystemTime::now());
                }
            }
            Event::StopRecording => self.stop_recording(),
            Event::ListSessions => {
                if self.sessions.is_empty() {
                    info!("No sessions recorded");
                }
                for session in self.sessions.list() {
                    info!("{}", session);
                }
            }
            Event::DeleteSession(id) => {
                if !self.sessions.remove(id) {
                    warn!(id, "No such session");
                }
            }
            Event::ExportSession(id) => {
                if let Err(e) = self.sessions.export(id, &self.export_dir) {
                    error!(id, err = %e, "Unable to export session");
                }
            }
            Event::Status => info!("{}", self.status()),
            Event::Quit => self.handle.stop(),
        }
    }

    /// Describes what is sounding, how loud the input is and the current settings.
    pub fn status(&self) -> String {
        let snapshot = *self.snapshots.borrow();
        let note = match snapshot.state {
            TriggerState::Sounding(note) => note.to_string(),
            TriggerState::Silent => "--".to_string(),
        };
        format!(
            "{:<4} [{}] {}{}",
            note,
            meter(snapshot.loudness),
            self.settings.snapshot(),
            if self.recorder.is_recording() {
                " REC"
            } else {
                ""
            }
        )
    }

    /// Stops the scheduler loop, releases anything sounding and saves any
    /// recording in progress.
    pub async fn stop(&mut self) {
        self.handle.stop();
        if let Some(task) = self.scheduler.take() {
            match task.await {
                Ok(mut scheduler) => {
                    scheduler.detach();
                }
                Err(e) => error!(err = %e, "Scheduler task failed"),
            }
        }
        self.stop_recording();
        self.presenter.abort();
        info!(sessions = self.sessions.len(), "Studio stopped");
    }

    fn stop_recording(&mut self) {
        let started_at = self.recording_started.take();
        let Some(audio) = self.recorder.stop() else {
            return;
        };

        let settings = self.settings.snapshot();
        self.sessions.push(
            started_at.unwrap_or_else(SystemTime::now),
            audio,
            &settings.instrument,
            self.bpm,
            settings.scale,
        );
    }

    /// Logs every change of the sounding note.
    async fn present(mut snapshots: watch::Receiver<Snapshot>) {
        let mut last = TriggerState::Silent;
        while snapshots.changed().await.is_ok() {
            let snapshot = *snapshots.borrow_and_update();
            if snapshot.state == last {
                continue;
            }
            match snapshot.state {
                TriggerState::Sounding(note) => info!(
                    note = %note,
                    frequency = snapshot.frequency.unwrap_or_default(),
                    loudness = snapshot.loudness,
                    "Note"
                ),
                TriggerState::Silent => info!("Silence"),
            }
            last = snapshot.state;
        }
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.handle.stop();
        self.presenter.abort();
    }
}

/// Draws a loudness level as a bar on a dBFS scale.
fn meter(loudness: f32) -> String {
    let db = if loudness > 0.0 {
        20.0 * loudness.log10()
    } else {
        METER_FLOOR_DB
    };
    let fraction = ((db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0);
    let filled = (fraction * METER_WIDTH as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), " ".repeat(METER_WIDTH - filled))
}
