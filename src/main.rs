// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use synthesketch::audio::{self, OutputFormat};
use synthesketch::config::{self, Synth};
use synthesketch::midi;
use synthesketch::waveform::Preset;
use synthesketch::Synthesizer;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic waveform synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Sounds the given notes together through the audio device.
    Tone {
        /// The device name to play through.
        device_name: String,
        /// The MIDI notes to play.
        #[arg(required = true)]
        notes: Vec<u8>,
        /// The waveform preset: sine, square or saw.
        #[arg(short, long, default_value = "sine")]
        waveform: String,
        /// How long to hold the notes.
        #[arg(long, default_value = "1s")]
        hold: String,
        /// The output sample rate.
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
        /// The output bits per sample: 8, 16 or 32.
        #[arg(long, default_value_t = 16)]
        bits_per_sample: u16,
        /// The number of output channels: 1 or 2.
        #[arg(long, default_value_t = 1)]
        channels: u16,
        /// Use unsigned samples.
        #[arg(long)]
        unsigned: bool,
        /// Use big endian samples.
        #[arg(long)]
        big_endian: bool,
        /// The number of voices.
        #[arg(long, default_value_t = synthesketch::synth::DEFAULT_VOICES)]
        voices: usize,
    },
    /// Starts the synthesizer from a config file and plays keys typed on stdin. Each character
    /// toggles its key, an empty line releases every key, and "quit" exits.
    Start {
        /// The path to the synthesizer config.
        config_path: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
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
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Tone {
            device_name,
            notes,
            waveform,
            hold,
            sample_rate,
            bits_per_sample,
            channels,
            unsigned,
            big_endian,
            voices,
        } => {
            let hold: Duration = DurationString::from_string(hold)?.into();
            let format =
                OutputFormat::new(sample_rate, bits_per_sample, channels, !unsigned, big_endian);

            let synthesizer = Synthesizer::new();
            synthesizer.set_waveform(Some(Preset::from_str(&waveform)?.waveform()))?;
            synthesizer.set_output_with_voices(audio::get_device(&device_name)?, format, voices)?;

            for note in notes.iter() {
                synthesizer.note_on(*note);
            }
            println!(
                "Playing {:?} on {} for {:?}.",
                synthesizer.active_notes(),
                device_name,
                hold
            );
            thread::sleep(hold);
            for note in notes.iter() {
                synthesizer.note_off(*note);
            }
            synthesizer.close();
        }
        Commands::Start { config_path } => {
            let config = Synth::deserialize(&PathBuf::from(config_path))?;
            debug!(config = config.to_yaml()?, "Loaded config.");
            let session = config::init_session_from_config(&config)?;

            println!("Type keys and press enter to play. Empty line releases all keys, \"quit\" exits.");
            for line in io::stdin().lock().lines() {
                let line = line?;
                let line = line.trim();
                if line == "quit" {
                    break;
                }
                if line.is_empty() {
                    session.keyboard().release_all();
                    continue;
                }
                for key in line.chars() {
                    session.keyboard().key_toggled(key);
                }
                println!("Holding {:?}", session.synthesizer().active_notes());
            }

            session.close();
        }
    }

    Ok(())
}
