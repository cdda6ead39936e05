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

//! Precomputed, encoded loop buffers for every playable note.

use std::{
    collections::BTreeMap,
    fmt,
    ops::RangeInclusive,
    sync::Arc,
    time::Instant,
};

use rayon::prelude::*;
use tracing::debug;

use crate::{
    audio::{pcm, OutputFormat},
    error::SynthError,
    waveform::{self, Waveform},
};

/// Upper bound on the length of a single note buffer, in seconds. Also the
/// size of each line's device buffer, so a note-off is heard within roughly
/// this much time.
pub const MAX_BUFFER_DURATION: f64 = 0.05;

/// Lowest note in the default range.
pub const DEFAULT_LOW_NOTE: u8 = 36;

/// Highest note in the default range.
pub const DEFAULT_HIGH_NOTE: u8 = 96;

/// Inclusive range of MIDI notes that get a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteRange {
    low: u8,
    high: u8,
}

impl Default for NoteRange {
    fn default() -> Self {
        NoteRange {
            low: DEFAULT_LOW_NOTE,
            high: DEFAULT_HIGH_NOTE,
        }
    }
}

impl NoteRange {
    /// Creates a new note range. Both ends must be valid MIDI notes and `low`
    /// must not exceed `high`.
    pub fn new(low: u8, high: u8) -> Result<NoteRange, SynthError> {
        if high > 127 {
            return Err(SynthError::invalid(format!(
                "note {} is outside the MIDI range",
                high
            )));
        }
        if low > high {
            return Err(SynthError::invalid(format!(
                "note range {}-{} is empty",
                low, high
            )));
        }
        Ok(NoteRange { low, high })
    }

    pub fn low(&self) -> u8 {
        self.low
    }

    pub fn high(&self) -> u8 {
        self.high
    }

    pub fn contains(&self, note: u8) -> bool {
        (self.low..=self.high).contains(&note)
    }

    pub fn notes(&self) -> RangeInclusive<u8> {
        self.low..=self.high
    }
}

impl fmt::Display for NoteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Equal-tempered frequency of a MIDI note, A4 (69) at 440 Hz.
pub fn frequency(note: u8) -> f64 {
    440.0 * 2f64.powf((note as f64 - 69.0) / 12.0)
}

/// Renders the loop buffer for a single note: a whole number of periods,
/// at most [MAX_BUFFER_DURATION] long, so looping it is seamless.
pub fn render_note(
    waveform: &[f64],
    format: &OutputFormat,
    note: u8,
) -> Result<Vec<u8>, SynthError> {
    let frequency = frequency(note);
    let period_frames = format.sample_rate as f64 / frequency;
    let periods = (MAX_BUFFER_DURATION / (1.0 / frequency)).floor().max(1.0);
    let buffer_frames = (periods * period_frames).round().max(1.0) as usize;

    let samples = waveform::resample(waveform, buffer_frames, period_frames);
    pcm::encode(&samples, format)
}

/// Encoded buffers keyed by note. Built in full and then never modified.
pub struct SampleTable {
    format: OutputFormat,
    range: NoteRange,
    buffers: BTreeMap<u8, Arc<[u8]>>,
}

impl SampleTable {
    /// Builds a buffer for every note in the range. The format is checked
    /// before any work is done, and the table only exists if every note
    /// rendered.
    pub fn build(
        waveform: &Waveform,
        format: &OutputFormat,
        range: NoteRange,
    ) -> Result<SampleTable, SynthError> {
        format.validate()?;

        let start = Instant::now();
        let buffers = range
            .notes()
            .collect::<Vec<u8>>()
            .into_par_iter()
            .map(|note| {
                render_note(waveform, format, note).map(|buffer| (note, Arc::from(buffer)))
            })
            .collect::<Result<BTreeMap<u8, Arc<[u8]>>, SynthError>>()?;

        debug!(
            notes = buffers.len(),
            range = %range,
            format = %format,
            elapsed = ?start.elapsed(),
            "Built sample table."
        );

        Ok(SampleTable {
            format: *format,
            range,
            buffers,
        })
    }

    /// Returns the buffer for the note, if the note is in range.
    pub fn get(&self, note: u8) -> Option<Arc<[u8]>> {
        self.buffers.get(&note).cloned()
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    pub fn range(&self) -> NoteRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
