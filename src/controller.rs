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
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, info_span, Instrument};

use crate::studio::Studio;
use crate::tracker::ScaleFilter;

pub mod keyboard;

/// Controller events that change the running studio.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Selects the scale filter notes are snapped to.
    SetScale(ScaleFilter),

    /// Turns the octave-below layer on or off.
    SetEpic(bool),

    /// Selects the instrument notes are played on.
    SetInstrument(String),

    /// Starts recording the output mix.
    Record,

    /// Stops recording and saves a session. If nothing is being recorded, does nothing.
    StopRecording,

    /// Lists the saved sessions.
    ListSessions,

    /// Deletes a saved session.
    DeleteSession(u64),

    /// Writes a saved session to the export directory.
    ExportSession(u64),

    /// Shows the current note and loudness.
    Status,

    /// Stops the studio.
    Quit,
}

impl FromStr for Event {
    type Err = String;

    /// Parses a command line such as `scale min` or `export 3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let command = parts.next().ok_or("empty command")?.to_lowercase();
        let argument = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments: {}", s.trim()));
        }

        let required = || argument.ok_or_else(|| format!("{} requires an argument", command));
        let session_id = || {
            let argument = required()?;
            argument
                .parse::<u64>()
                .map_err(|e| format!("invalid session id {}: {}", argument, e))
        };
        let no_argument = |event: Event| match argument {
            Some(argument) => Err(format!("{} takes no argument, got {}", command, argument)),
            None => Ok(event),
        };

        match command.as_str() {
            "scale" => Ok(Event::SetScale(required()?.parse()?)),
            "epic" => match required()?.to_lowercase().as_str() {
                "on" | "true" => Ok(Event::SetEpic(true)),
                "off" | "false" => Ok(Event::SetEpic(false)),
                other => Err(format!("epic must be on or off, got {}", other)),
            },
            "instrument" => Ok(Event::SetInstrument(required()?.to_string())),
            "rec" | "record" => no_argument(Event::Record),
            "stop" => no_argument(Event::StopRecording),
            "sessions" => no_argument(Event::ListSessions),
            "delete" => Ok(Event::DeleteSession(session_id()?)),
            "export" => Ok(Event::ExportSession(session_id()?)),
            "status" => no_argument(Event::Status),
            "quit" | "exit" => no_argument(Event::Quit),
            _ => Err(format!("unknown command {}", command)),
        }
    }
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Applies driver events to a studio.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(studio: Studio, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(
                Controller::trigger_events(studio, driver).instrument(info_span!("controller")),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Applies events from the driver until it quits or closes.
    async fn trigger_events(mut studio: Studio, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(settings = %studio.settings().snapshot(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = ?event, "Received event.");
            if event == Event::Quit {
                break;
            }
            studio.apply(event);
        }

        info!("Controller closing.");
        studio.stop().await;
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop"),
            Ok(Ok(())) => {}
        }
    }
}
