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

//! The real-time scheduler loop.
//!
//! Once per tick the scheduler pulls a frame from the signal source, measures
//! its loudness and pitch, quantizes the pitch, runs the note trigger and
//! publishes a snapshot for presentation. Ticks never overlap: each one
//! finishes, voice engine calls included, before the next is scheduled.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::{watch, Notify},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::audio::SignalSource;
use crate::samples::{Envelope, VoiceEngine};
use crate::settings::SharedSettings;
use crate::tracker::{
    quantize, rms, NoteTrigger, PitchConfig, PitchEstimator, Transition, TriggerConfig,
    TriggerState,
};

/// The collaborators a running session drives. Attached for the lifetime of a
/// session and detached when it ends.
pub struct EngineContext {
    pub source: Arc<dyn SignalSource>,
    pub voice: Box<dyn VoiceEngine>,
}

/// What presentation sees after each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// Loudness of the last analysed frame.
    pub loudness: f32,
    /// Raw pitch estimate of the last analysed frame.
    pub frequency: Option<f32>,
    /// What is currently sounding.
    pub state: TriggerState,
    /// Number of analysed ticks so far.
    pub ticks: u64,
}

/// Starts and stops a running loop from another task.
#[derive(Clone, Default)]
pub struct LoopHandle {
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl LoopHandle {
    pub fn new() -> LoopHandle {
        LoopHandle::default()
    }

    /// Asks the loop to stop after the current tick. Safe to call before the
    /// loop starts, in which case it exits immediately.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Returns true while the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("running", &self.is_running())
            .finish()
    }
}

/// Runs the tracking pipeline one tick at a time.
pub struct Scheduler {
    estimator: PitchEstimator,
    trigger: NoteTrigger,
    settings: SharedSettings,
    context: Option<EngineContext>,
    /// The instrument last pushed to the voice engine.
    instrument: Option<String>,
    /// Envelope applied on top of every instrument's own.
    envelope: Option<Envelope>,
    publisher: watch::Sender<Snapshot>,
    ticks: u64,
}

impl Scheduler {
    /// Creates an idle scheduler and the receiver its snapshots are published on.
    pub fn new(
        pitch: PitchConfig,
        trigger: TriggerConfig,
        settings: SharedSettings,
    ) -> (Scheduler, watch::Receiver<Snapshot>) {
        let (publisher, receiver) = watch::channel(Snapshot::default());
        (
            Scheduler {
                estimator: PitchEstimator::new(pitch),
                trigger: NoteTrigger::new(trigger),
                settings,
                context: None,
                instrument: None,
                envelope: None,
                publisher,
                ticks: 0,
            },
            receiver,
        )
    }

    /// Attaches a session's collaborators. Ticks are no-ops until this is called.
    pub fn attach(&mut self, context: EngineContext) {
        self.detach();
        self.instrument = None;
        self.context = Some(context);
        info!("Engine attached");
    }

    /// Detaches the session's collaborators, releasing anything still sounding.
    pub fn detach(&mut self) -> Option<EngineContext> {
        let mut context = self.context.take()?;
        if self.trigger.reset(context.voice.as_mut()) != Transition::None {
            self.publish(0.0, None);
        }
        info!("Engine detached");
        Some(context)
    }

    /// Sets an envelope that replaces each instrument's own once it is selected.
    pub fn set_envelope(&mut self, envelope: Option<Envelope>) {
        self.envelope = envelope;
        self.instrument = None;
    }

    /// Returns true if collaborators are attached.
    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    /// Returns a new receiver for published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.publisher.subscribe()
    }

    /// Returns the current trigger state.
    pub fn state(&self) -> TriggerState {
        self.trigger.state()
    }

    /// Runs a single tick. Returns None when nothing was analysed, either
    /// because no engine is attached or the source had no frame.
    ///
    /// Switching instrument releases everything and forces the trigger silent
    /// even while the input stays loud. A held note re-attacks on the new
    /// instrument as soon as the trigger confirms it again.
    pub fn tick(&mut self) -> Option<Transition> {
        let context = self.context.as_mut()?;
        let settings = self.settings.snapshot();

        if self.instrument.as_deref() != Some(settings.instrument.as_str()) {
            match context.voice.set_active_instrument(&settings.instrument) {
                Ok(()) => {
                    self.trigger.reset(context.voice.as_mut());
                    if let Some(envelope) = self.envelope {
                        context.voice.configure_envelope(envelope);
                    }
                    debug!(instrument = settings.instrument, "Instrument applied");
                }
                Err(e) => warn!(
                    err = %e,
                    instrument = settings.instrument,
                    "Unable to select instrument, keeping the previous one"
                ),
            }
            self.instrument = Some(settings.instrument.clone());
        }

        let frame = context.source.current_frame()?;
        let loudness = rms(frame.samples());
        let frequency = self.estimator.estimate(&frame);
        let note = frequency.map(|frequency| quantize(frequency, settings.scale));
        let transition =
            self.trigger
                .update(loudness, note, settings.epic, context.voice.as_mut());

        self.ticks += 1;
        self.publish(loudness, frequency);
        Some(transition)
    }

    /// Ticks at the given interval until the handle is stopped, then releases
    /// anything still sounding. Returns the scheduler so the caller can detach.
    pub async fn run(mut self, handle: LoopHandle, interval: Duration) -> Scheduler {
        handle.running.store(true, Ordering::SeqCst);
        info!(interval_ms = interval.as_millis(), "Scheduler started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = handle.stop.notified() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        if let Some(context) = self.context.as_mut() {
            if self.trigger.reset(context.voice.as_mut()) != Transition::None {
                self.publish(0.0, None);
            }
        }
        handle.running.store(false, Ordering::SeqCst);
        info!(ticks = self.ticks, "Scheduler stopped");
        self
    }

    fn publish(&self, loudness: f32, frequency: Option<f32>) {
        self.publisher.send_replace(Snapshot {
            loudness,
            frequency,
            state: self.trigger.state(),
            ticks: self.ticks,
        });
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("attached", &self.is_attached())
            .field("state", &self.trigger.state())
            .field("ticks", &self.ticks)
            .finish()
    }
}
