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

//! Single-cycle waveforms and the circular resampler used to pitch them.

use std::{f64::consts::PI, fmt, ops::Deref, str::FromStr, sync::Arc};

use crate::error::SynthError;

/// Length of the preset waveforms.
pub const DEFAULT_WAVEFORM_LENGTH: usize = 44100;

/// One cycle of a periodic waveform. Values are nominally in [-1, 1] but
/// this is not enforced. Cloning is cheap; the samples are shared and never
/// mutated once constructed.
#[derive(Clone, PartialEq)]
pub struct Waveform {
    samples: Arc<[f64]>,
}

impl Waveform {
    /// Copies the given samples into a new waveform.
    pub fn new(samples: &[f64]) -> Result<Waveform, SynthError> {
        if samples.is_empty() {
            return Err(SynthError::invalid("waveform must have at least one sample"));
        }
        Ok(Waveform {
            samples: Arc::from(samples),
        })
    }

    /// Returns a copy of the samples.
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.to_vec()
    }
}

impl Deref for Waveform {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.samples
    }
}

impl fmt::Debug for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waveform")
            .field("len", &self.samples.len())
            .finish()
    }
}

/// The built-in waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Sine,
    Square,
    Saw,
}

impl Preset {
    /// Generates the preset at the given length.
    pub fn generate(self, len: usize) -> Vec<f64> {
        match self {
            Preset::Sine => sine(len),
            Preset::Square => square(len),
            Preset::Saw => saw(len),
        }
    }

    /// Generates the preset as a waveform of the default length.
    pub fn waveform(self) -> Waveform {
        Waveform {
            samples: Arc::from(self.generate(DEFAULT_WAVEFORM_LENGTH)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Sine => "sine",
            Preset::Square => "square",
            Preset::Saw => "saw",
        }
    }
}

impl FromStr for Preset {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sine" => Ok(Preset::Sine),
            "square" => Ok(Preset::Square),
            "saw" | "sawtooth" => Ok(Preset::Saw),
            _ => Err(SynthError::invalid(format!("unknown waveform preset: {}", s))),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One cycle of a sine wave.
pub fn sine(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| lerp(0.0, 2.0 * PI, i as f64 / len as f64).sin())
        .collect()
}

/// One cycle of a square wave: -1 for the first half, +1 for the second.
pub fn square(len: usize) -> Vec<f64> {
    let half = (len / 2) as i64;
    (0..len)
        .map(|i| match (i as i64 - half).signum() {
            0 => 0.0,
            s => s as f64,
        })
        .collect()
}

/// One cycle of a rising ramp from 0 towards 1.
pub fn saw(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 / len as f64).collect()
}

/// Linear interpolation between `x` and `y` by `d` in [0, 1].
#[inline]
pub fn lerp(x: f64, y: f64, d: f64) -> f64 {
    x + d * (y - x)
}

/// Resamples one cycle to exactly `output_len` samples.
pub fn resample_to(waveform: &[f64], output_len: usize) -> Vec<f64> {
    resample(waveform, output_len, output_len as f64)
}

/// Resamples `waveform` into `output_len` samples, treating every
/// `cycle_len` output samples as one full cycle. When `output_len` spans
/// several cycles the shape is tiled, which is how a buffer holding a whole
/// number of pitch periods is produced. `cycle_len` may be fractional.
///
/// The waveform index wraps around, so the last sample interpolates back
/// towards the first.
pub fn resample(waveform: &[f64], output_len: usize, cycle_len: f64) -> Vec<f64> {
    let len = waveform.len();
    if len == 0 || cycle_len <= 0.0 {
        return vec![0.0; output_len];
    }

    (0..output_len)
        .map(|i| {
            let position = (i as f64 % cycle_len) / cycle_len;
            let source = position * len as f64;
            let lower = source.floor() as usize % len;
            let upper = source.ceil() as usize % len;
            lerp(waveform[lower], waveform[upper], source.fract())
        })
        .collect()
}
