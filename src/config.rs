// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::{error::Error, path::Path, sync::Arc};

use tracing::{info, span, Level};

use crate::{
    audio,
    midi::{self, keyboard::Keyboard},
    synth::Synthesizer,
};

mod error;
mod synth;

pub use self::error::ConfigError;
pub use self::synth::{Synth, WaveformShape};

/// A running synthesizer and the inputs feeding it. MIDI input, if
/// configured, passes through the keyboard on its way to the synthesizer.
pub struct Session {
    synthesizer: Arc<Synthesizer>,
    keyboard: Arc<Keyboard>,
    midi_device: Option<Arc<dyn midi::Device>>,
}

impl Session {
    pub fn synthesizer(&self) -> &Arc<Synthesizer> {
        &self.synthesizer
    }

    pub fn keyboard(&self) -> &Arc<Keyboard> {
        &self.keyboard
    }

    pub fn midi_device(&self) -> Option<&Arc<dyn midi::Device>> {
        self.midi_device.as_ref()
    }

    /// Stops MIDI input, releases every key and closes the synthesizer.
    pub fn close(&self) {
        if let Some(midi_device) = &self.midi_device {
            midi_device.stop_watch_events();
        }
        self.keyboard.release_all();
        self.synthesizer.close();
    }
}

/// Initializes a synthesizer session from the given config file.
pub fn init_session(path: &Path) -> Result<Session, Box<dyn Error>> {
    let config = Synth::deserialize(path)?;
    init_session_from_config(&config)
}

/// Initializes a synthesizer session from a parsed config.
pub fn init_session_from_config(config: &Synth) -> Result<Session, Box<dyn Error>> {
    let span = span!(Level::INFO, "init session");
    let _enter = span.enter();

    let format = config.output_format()?;
    let waveform = config.waveform()?;
    let note_range = config.note_range()?;
    let device = audio::get_device(config.audio_device())?;
    let midi_device = config
        .midi_device()
        .map(midi::get_device)
        .map_or(Ok(None), |result| result.map(Some))?;

    let synthesizer = Arc::new(Synthesizer::with_note_range(note_range));
    synthesizer.set_waveform(Some(waveform))?;
    synthesizer.set_output_with_voices(device, format, config.voices())?;

    let keyboard = Arc::new(Keyboard::default());
    keyboard
        .transmitter()
        .set_receiver(Some(synthesizer.clone()));
    if let Some(midi_device) = &midi_device {
        if let Err(e) = midi_device.watch_events(keyboard.clone()) {
            synthesizer.close();
            return Err(e.into());
        }
    }

    info!(
        device = config.audio_device(),
        midi_device = config.midi_device(),
        voices = config.voices(),
        note_range = %note_range,
        "Synthesizer ready."
    );
    Ok(Session {
        synthesizer,
        keyboard,
        midi_device,
    })
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_init_session() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("synth.yaml");
        std::fs::write(
            &path,
            r#"
audio_device: mock-device
voices: 3
waveform: saw
midi_device: mock-midi
"#,
        )?;

        let session = init_session(&path)?;
        let synthesizer = session.synthesizer();
        assert!(synthesizer.is_configured());
        assert_eq!(synthesizer.voice_count(), Some(3));
        assert_eq!(
            synthesizer.device_name(),
            Some("mock-device".to_string())
        );

        assert!(session.keyboard().key_pressed('e'));
        assert_eq!(synthesizer.active_notes(), vec![60]);
        assert!(session.keyboard().key_released('e'));
        assert!(synthesizer.active_notes().is_empty());

        assert_eq!(
            session.midi_device().map(|device| device.name()),
            Some("mock-midi".to_string())
        );

        session.close();
        assert!(!synthesizer.is_configured());
        Ok(())
    }

    #[test]
    fn test_init_session_rejects_bad_format() -> Result<(), Box<dyn Error>> {
        let config: Synth =
            serde_yml::from_str("audio_device: mock-device\nbits_per_sample: 24\n")?;
        assert!(init_session_from_config(&config).is_err());
        Ok(())
    }

    #[test]
    fn test_init_session_missing_file() {
        assert!(init_session(Path::new("/nonexistent/synth.yaml")).is_err());
    }
}
