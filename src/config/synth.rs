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
use std::{path::Path, str::FromStr};

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::{
    audio::{Encoding, OutputFormat},
    synth::{NoteRange, DEFAULT_VOICES},
    waveform::{Preset, Waveform},
};

/// The waveform to play: either a preset name or one cycle of samples.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum WaveformShape {
    Preset(String),
    Samples(Vec<f64>),
}

/// An inclusive range of MIDI notes.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Notes {
    low: u8,
    high: u8,
}

/// A YAML representation of the synthesizer configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Synth {
    /// The audio output device.
    audio_device: String,

    /// Sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Bits per sample, 8, 16 or 32 (default: 16)
    bits_per_sample: Option<u16>,

    /// Output channels, 1 or 2 (default: 1)
    channels: Option<u16>,

    /// "pcm_signed" or "pcm_unsigned" (default: "pcm_signed")
    encoding: Option<String>,

    /// Whether samples are big endian (default: false)
    big_endian: Option<bool>,

    /// Number of notes that can sound at once (default: 8)
    voices: Option<usize>,

    /// The waveform (default: sine)
    waveform: Option<WaveformShape>,

    /// The MIDI input device to play from, if any.
    midi_device: Option<String>,

    /// Playable notes (default: 36-96)
    note_range: Option<Notes>,
}

impl Synth {
    /// Creates a configuration for the device with every other value at its
    /// default.
    pub fn new(audio_device: &str) -> Synth {
        Synth {
            audio_device: audio_device.to_string(),
            sample_rate: None,
            bits_per_sample: None,
            channels: None,
            encoding: None,
            big_endian: None,
            voices: None,
            waveform: None,
            midi_device: None,
            note_range: None,
        }
    }

    /// Deserializes a file from the path into a synthesizer configuration.
    pub fn deserialize(path: &Path) -> Result<Synth, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Synth>()?)
    }

    /// Serializes the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn audio_device(&self) -> &str {
        &self.audio_device
    }

    /// Returns the output format. The format is not validated here; the
    /// synthesizer rejects formats it cannot play.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        let defaults = OutputFormat::default();
        let encoding = match self.encoding.as_deref() {
            Some(encoding) => Encoding::from_str(encoding)?,
            None => defaults.encoding,
        };

        Ok(OutputFormat {
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            bits_per_sample: self.bits_per_sample.unwrap_or(defaults.bits_per_sample),
            channels: self.channels.unwrap_or(defaults.channels),
            encoding,
            big_endian: self.big_endian.unwrap_or(defaults.big_endian),
        })
    }

    /// Returns the number of voices (default: 8)
    pub fn voices(&self) -> usize {
        self.voices.unwrap_or(DEFAULT_VOICES)
    }

    /// Returns the waveform (default: sine)
    pub fn waveform(&self) -> Result<Waveform, ConfigError> {
        Ok(match &self.waveform {
            Some(WaveformShape::Preset(name)) => Preset::from_str(name)?.waveform(),
            Some(WaveformShape::Samples(samples)) => Waveform::new(samples)?,
            None => Preset::Sine.waveform(),
        })
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    /// Returns the note range (default: 36-96)
    pub fn note_range(&self) -> Result<NoteRange, ConfigError> {
        Ok(match self.note_range {
            Some(notes) => NoteRange::new(notes.low, notes.high)?,
            None => NoteRange::default(),
        })
    }
}
