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

//! A polyphonic synthesizer that plays an arbitrary, user-drawn waveform.
//!
//! The waveform is resampled once per MIDI note into a buffer holding a whole
//! number of periods, encoded to the output PCM format, and looped by one
//! playback voice per sounding note. Each voice owns its own output line.

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod playsync;
pub mod synth;
pub mod waveform;

#[cfg(test)]
mod testutil;

pub use error::SynthError;
pub use synth::Synthesizer;
pub use waveform::Waveform;
