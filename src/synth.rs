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
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use crate::{
    audio::{Device, OutputFormat},
    error::SynthError,
    midi::{self, NoteSink, Receiver},
    waveform::Waveform,
};

pub mod table;
pub mod voice;

pub use table::{NoteRange, SampleTable};
pub use voice::VoicePool;

/// Number of voices used by [Synthesizer::set_output].
pub const DEFAULT_VOICES: usize = 8;

/// Everything that exists while the synthesizer is configured.
struct Output {
    device: Arc<dyn Device>,
    format: OutputFormat,
    pool: VoicePool,
    /// Present only while a waveform is set.
    table: Option<Arc<SampleTable>>,
}

#[derive(Default)]
struct State {
    waveform: Option<Waveform>,
    output: Option<Output>,
}

/// A polyphonic synthesizer playing a single waveform. It is unconfigured
/// until an output is set; note events are ignored until then, and while
/// no waveform is set.
pub struct Synthesizer {
    state: Mutex<State>,
    note_range: NoteRange,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::new()
    }
}

impl Synthesizer {
    /// Creates an unconfigured synthesizer covering the default note range.
    pub fn new() -> Synthesizer {
        Synthesizer::with_note_range(NoteRange::default())
    }

    pub fn with_note_range(note_range: NoteRange) -> Synthesizer {
        Synthesizer {
            state: Mutex::new(State::default()),
            note_range,
        }
    }

    /// Configures output with [DEFAULT_VOICES] voices.
    pub fn set_output(
        &self,
        device: Arc<dyn Device>,
        format: OutputFormat,
    ) -> Result<(), SynthError> {
        self.set_output_with_voices(device, format, DEFAULT_VOICES)
    }

    /// Tears down any existing output and opens `voice_count` lines on the
    /// device. Argument and format errors leave the current output in place.
    /// If the new lines cannot be opened, the synthesizer is left
    /// unconfigured.
    pub fn set_output_with_voices(
        &self,
        device: Arc<dyn Device>,
        format: OutputFormat,
        voice_count: usize,
    ) -> Result<(), SynthError> {
        format.validate()?;
        if voice_count < 1 {
            return Err(SynthError::invalid("voice count must be at least 1"));
        }

        let span = span!(Level::INFO, "set output", device = device.name());
        let _enter = span.enter();

        let mut state = self.state.lock();
        let table = match &state.waveform {
            Some(waveform) => Some(Arc::new(SampleTable::build(
                waveform,
                &format,
                self.note_range,
            )?)),
            None => None,
        };

        if let Some(old) = state.output.take() {
            debug!(device = old.device.name(), "Tearing down previous output.");
            old.pool.teardown();
        }

        let pool = VoicePool::open(device.as_ref(), &format, voice_count)?;
        info!(
            device = device.name(),
            format = %format,
            voices = voice_count,
            "Output configured."
        );
        state.output = Some(Output {
            device,
            format,
            pool,
            table,
        });
        Ok(())
    }

    /// Stops every voice, closes every line and returns to unconfigured. The
    /// waveform is kept.
    pub fn clear_output(&self) {
        Synthesizer::clear(&mut self.state.lock());
    }

    /// Tears down the output while the caller holds the state lock, so no
    /// reconfiguration can start until every worker has exited.
    fn clear(state: &mut State) {
        if let Some(output) = state.output.take() {
            output.pool.teardown();
            info!(device = output.device.name(), "Output cleared.");
        }
    }

    /// Replaces the waveform, rebuilding the sample table if configured.
    /// `None` removes the waveform and the table. If the table cannot be
    /// built, nothing changes.
    pub fn set_waveform(&self, waveform: Option<Waveform>) -> Result<(), SynthError> {
        let mut state = self.state.lock();
        let table = match (&waveform, &state.output) {
            (Some(waveform), Some(output)) => Some(Arc::new(SampleTable::build(
                waveform,
                &output.format,
                self.note_range,
            )?)),
            _ => None,
        };

        debug!(
            len = waveform.as_ref().map(|waveform| waveform.len()),
            "Waveform set."
        );
        state.waveform = waveform;
        if let Some(output) = state.output.as_mut() {
            output.table = table;
        }
        Ok(())
    }

    /// Returns the current waveform. The returned value is independent of
    /// later changes to the synthesizer.
    pub fn waveform(&self) -> Option<Waveform> {
        self.state.lock().waveform.clone()
    }

    /// Starts sounding the note if configured, a waveform is set, the note is
    /// in range, it is not already sounding and a voice is free.
    pub fn note_on(&self, note: u8) {
        let state = self.state.lock();
        let Some(output) = state.output.as_ref() else {
            return;
        };
        let Some(buffer) = output.table.as_ref().and_then(|table| table.get(note)) else {
            return;
        };
        output.pool.note_on(note, buffer);
    }

    /// Stops sounding the note. Does nothing if it is not sounding.
    pub fn note_off(&self, note: u8) {
        if let Some(output) = self.state.lock().output.as_ref() {
            output.pool.note_off(note);
        }
    }

    /// Clears both the output and the waveform.
    pub fn close(&self) {
        let mut state = self.state.lock();
        Synthesizer::clear(&mut state);
        state.waveform = None;
    }

    pub fn is_configured(&self) -> bool {
        self.state.lock().output.is_some()
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.state.lock().output.as_ref().map(|output| output.format)
    }

    pub fn device_name(&self) -> Option<String> {
        self.state
            .lock()
            .output
            .as_ref()
            .map(|output| output.device.name())
    }

    pub fn voice_count(&self) -> Option<usize> {
        self.state
            .lock()
            .output
            .as_ref()
            .map(|output| output.pool.capacity())
    }

    /// Notes currently sounding, in ascending order.
    pub fn active_notes(&self) -> Vec<u8> {
        self.state
            .lock()
            .output
            .as_ref()
            .map(|output| output.pool.active_notes())
            .unwrap_or_default()
    }

    pub fn note_range(&self) -> NoteRange {
        self.note_range
    }

    #[cfg(test)]
    fn table(&self) -> Option<Arc<SampleTable>> {
        self.state
            .lock()
            .output
            .as_ref()
            .and_then(|output| output.table.clone())
    }
}

impl NoteSink for Synthesizer {
    fn note_on(&self, note: u8) {
        Synthesizer::note_on(self, note);
    }

    fn note_off(&self, note: u8) {
        Synthesizer::note_off(self, note);
    }
}

impl Receiver for Synthesizer {
    fn send(&self, message: &[u8]) {
        midi::route(self, message);
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, thread, time::Duration};

    use super::*;
    use crate::{audio::mock, testutil::eventually, waveform::Preset};

    fn configured(
        device: &mock::Device,
        voices: usize,
    ) -> Result<Synthesizer, Box<dyn Error>> {
        let synth = Synthesizer::new();
        synth.set_waveform(Some(Preset::Sine.waveform()))?;
        synth.set_output_with_voices(Arc::new(device.clone()), OutputFormat::default(), voices)?;
        Ok(synth)
    }

    #[test]
    fn test_unconfigured_ignores_notes() -> Result<(), Box<dyn Error>> {
        let synth = Synthesizer::new();
        synth.set_waveform(Some(Preset::Sine.waveform()))?;
        synth.note_on(60);
        synth.note_off(60);
        assert!(!synth.is_configured());
        assert!(synth.active_notes().is_empty());
        assert!(synth.format().is_none());
        Ok(())
    }

    #[test]
    fn test_no_waveform_ignores_notes() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = Synthesizer::new();
        synth.set_output(Arc::new(device.clone()), OutputFormat::default())?;
        assert_eq!(synth.voice_count(), Some(DEFAULT_VOICES));
        assert_eq!(device.open_lines(), DEFAULT_VOICES);

        synth.note_on(60);
        assert!(synth.active_notes().is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_note_on() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 4)?;

        synth.note_on(60);
        synth.note_on(60);
        assert_eq!(synth.active_notes(), vec![60]);

        synth.note_off(60);
        assert!(synth.active_notes().is_empty());
        synth.close();
        Ok(())
    }

    #[test]
    fn test_voice_exhaustion_and_reuse() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;

        synth.note_on(60);
        synth.note_on(62);
        synth.note_on(64);
        assert_eq!(synth.active_notes(), vec![60, 62]);

        synth.note_off(60);
        eventually(
            || {
                synth.note_on(64);
                synth.active_notes() == vec![62, 64]
            },
            "Freed voice was never reused",
        );
        synth.close();
        Ok(())
    }

    #[test]
    fn test_out_of_range_note() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;
        synth.note_on(20);
        synth.note_on(120);
        assert!(synth.active_notes().is_empty());
        Ok(())
    }

    #[test]
    fn test_unsupported_format_leaves_state() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;
        let table = synth.table().ok_or("missing table")?;

        let other = mock::Device::get("mock-other");
        let result = synth.set_output(
            Arc::new(other.clone()),
            OutputFormat::new(44100, 24, 1, true, false),
        );
        assert!(matches!(result, Err(SynthError::UnsupportedFormat(_))));
        assert_eq!(other.open_lines(), 0);

        assert!(synth.is_configured());
        assert_eq!(synth.format(), Some(OutputFormat::default()));
        assert_eq!(synth.device_name(), Some("mock".to_string()));
        assert_eq!(device.open_lines(), 2);
        assert!(Arc::ptr_eq(&table, &synth.table().ok_or("missing table")?));

        let result = synth.set_output_with_voices(Arc::new(other), OutputFormat::default(), 0);
        assert!(matches!(result, Err(SynthError::InvalidArgument(_))));
        assert_eq!(synth.voice_count(), Some(2));
        Ok(())
    }

    #[test]
    fn test_reconfigure_releases_old_lines() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 3)?;
        synth.note_on(60);

        let other = mock::Device::get("mock-other");
        let stereo = OutputFormat::new(22050, 8, 2, false, true);
        synth.set_output_with_voices(Arc::new(other.clone()), stereo, 5)?;

        assert_eq!(device.open_lines(), 0);
        assert_eq!(other.open_lines(), 5);
        assert!(synth.active_notes().is_empty());
        assert_eq!(synth.format(), Some(stereo));
        assert_eq!(synth.table().ok_or("missing table")?.format(), &stereo);

        synth.note_on(60);
        assert_eq!(synth.active_notes(), vec![60]);
        synth.clear_output();
        assert_eq!(other.open_lines(), 0);
        Ok(())
    }

    #[test]
    fn test_line_failure_leaves_unconfigured() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;

        let small = mock::Device::get("mock-small").with_max_lines(2);
        let result =
            synth.set_output_with_voices(Arc::new(small.clone()), OutputFormat::default(), 4);
        assert!(matches!(result, Err(SynthError::LineUnavailable(_))));

        assert!(!synth.is_configured());
        assert_eq!(device.open_lines(), 0);
        assert_eq!(small.open_lines(), 0);
        assert!(synth.waveform().is_some());
        Ok(())
    }

    #[test]
    fn test_waveform_change_rebuilds_table() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;
        let sine = synth.table().ok_or("missing table")?;

        synth.set_waveform(Some(Preset::Square.waveform()))?;
        let square = synth.table().ok_or("missing table")?;
        assert!(!Arc::ptr_eq(&sine, &square));
        assert_ne!(sine.get(69), square.get(69));
        assert_eq!(
            synth.waveform().ok_or("missing waveform")?.to_vec(),
            Preset::Square.waveform().to_vec()
        );

        synth.set_waveform(None)?;
        assert!(synth.table().is_none());
        assert!(synth.waveform().is_none());
        synth.note_on(60);
        assert!(synth.active_notes().is_empty());
        Ok(())
    }

    #[test]
    fn test_midi_messages() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;

        synth.send(&[0x90, 60, 100]);
        assert_eq!(synth.active_notes(), vec![60]);
        synth.send(&[0x90, 60, 0]);
        assert!(synth.active_notes().is_empty());

        synth.send(&[0x91, 62, 1]);
        synth.send(&[0xB0, 62, 1]);
        assert_eq!(synth.active_notes(), vec![62]);
        synth.send(&[0x81, 62, 127]);
        assert!(synth.active_notes().is_empty());
        Ok(())
    }

    #[test]
    fn test_clear_output_excludes_reconfigure() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock").with_max_lines(2);
        let synth = Arc::new(configured(&device, 2)?);
        synth.note_on(36);
        synth.note_on(40);
        assert_eq!(synth.active_notes(), vec![36, 40]);

        let clear = {
            let synth = synth.clone();
            thread::spawn(move || synth.clear_output())
        };
        thread::sleep(Duration::from_millis(2));

        // Whichever call wins the lock, the other sees a fully torn down pool.
        synth.set_output_with_voices(Arc::new(device.clone()), OutputFormat::default(), 2)?;
        clear.join().unwrap();

        let expected = if synth.is_configured() { 2 } else { 0 };
        assert_eq!(device.open_lines(), expected);
        synth.close();
        assert_eq!(device.open_lines(), 0);
        Ok(())
    }

    #[test]
    fn test_close() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock");
        let synth = configured(&device, 2)?;
        synth.note_on(60);

        synth.close();
        assert!(!synth.is_configured());
        assert!(synth.waveform().is_none());
        assert_eq!(device.open_lines(), 0);
        Ok(())
    }
}
