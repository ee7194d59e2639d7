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
mod audio;
mod config;
mod controller;
mod effects;
mod recorder;
mod samples;
mod scheduler;
mod session;
mod settings;
mod studio;
#[cfg(test)]
mod testutil;
mod tracker;

use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::samples::mock::{Call, VoiceEngine as RecordingEngine};
use crate::samples::SampleLoader;
use crate::scheduler::{EngineContext, Scheduler};
use crate::settings::{Settings, SharedSettings};
use crate::tracker::ScaleFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Turns your voice into an instrument."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio input and output devices.
    Devices {},
    /// Starts a live session controlled from the keyboard.
    Start {
        /// The path to the studio config.
        config_path: String,
    },
    /// Runs the tracker over an audio file and prints the notes it would play.
    Analyze {
        /// The audio file to analyze.
        path: String,
        /// The path to a studio config for tracker settings.
        #[arg(short, long)]
        config: Option<String>,
        /// The scale to snap notes to (chr, maj, min, pen).
        #[arg(short, long)]
        scale: Option<ScaleFilter>,
        /// Whether to add the octave-below layer.
        #[arg(short, long)]
        epic: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { config_path } => {
            let config = config::Studio::deserialize(&PathBuf::from(config_path))?;
            let studio = studio::Studio::start(&config)?;
            controller::Controller::new(studio, Arc::new(controller::keyboard::Driver::new()))
                .join()
                .await?;
        }
        Commands::Analyze {
            path,
            config,
            scale,
            epic,
        } => {
            let config = match config {
                Some(config) => config::Studio::deserialize(&PathBuf::from(config))?,
                None => config::Studio::default(),
            };
            let mut settings = Settings::from_config(&config);
            if let Some(scale) = scale {
                settings.scale = scale;
            }
            if let Some(epic) = epic {
                settings.epic = epic;
            }

            for (seconds, call) in analyze(&PathBuf::from(&path), &config, settings)? {
                println!("{:>9.3}s  {}", seconds, describe(&call));
            }
        }
    }

    Ok(())
}

/// Feeds an audio file through the tracker one frame per tick interval and
/// returns every voice engine call with the time of the frame that caused it.
fn analyze(
    path: &Path,
    config: &config::Studio,
    settings: Settings,
) -> Result<Vec<(f64, Call)>, Box<dyn Error>> {
    let sample_rate = config.audio().sample_rate();
    let interval = config.tracker().tick_interval()?;
    let hop = ((interval.as_secs_f64() * sample_rate as f64).round() as usize).max(1);

    let sample = SampleLoader::new(sample_rate).load(path)?;
    let source = Arc::new(audio::mock::Source::new(
        sample.data().to_vec(),
        sample_rate,
        config.audio().frame_size(),
        hop,
    ));
    println!(
        "Analyzing {} ({:.2}s, {})",
        path.display(),
        sample.duration().as_secs_f32(),
        settings
    );

    let engine = RecordingEngine::new();
    let (mut scheduler, _) = Scheduler::new(
        config.tracker().pitch(),
        config.tracker().trigger(),
        SharedSettings::new(settings),
    );
    scheduler.set_envelope(config.session().envelope()?);
    scheduler.attach(EngineContext {
        source: source.clone(),
        voice: Box::new(engine.clone()),
    });

    let mut timeline = Vec::new();
    let mut position = source.position();
    while scheduler.tick().is_some() {
        let seconds = position as f64 / sample_rate as f64;
        timeline.extend(engine.take_calls().into_iter().map(|call| (seconds, call)));
        position = source.position();
    }
    scheduler.detach();
    let seconds = position as f64 / sample_rate as f64;
    timeline.extend(engine.take_calls().into_iter().map(|call| (seconds, call)));

    Ok(timeline)
}

fn describe(call: &Call) -> String {
    match call {
        Call::Attack(note, velocity) => format!("attack {} ({:.2})", note, velocity),
        Call::ReleaseAll => "release".to_string(),
        Call::ConfigureEnvelope(envelope) => format!("envelope {:?}", envelope),
        Call::SetInstrument(id) => format!("instrument {}", id),
    }
}
