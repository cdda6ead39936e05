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
use std::{fmt, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::SynthError;

pub mod keyboard;
mod midir;
pub mod mock;

/// Something that plays notes.
pub trait NoteSink: Send + Sync {
    fn note_on(&self, note: u8);

    fn note_off(&self, note: u8);
}

/// Accepts raw MIDI messages.
pub trait Receiver: Send + Sync {
    /// Handles a single raw message. Never fails; messages that cannot be
    /// handled are dropped.
    fn send(&self, message: &[u8]);
}

/// Interprets a raw short message as a note event for the sink. Only three
/// byte channel messages are considered. A NOTE_ON with velocity 0 is a
/// note off; velocity is otherwise ignored. Everything else is dropped.
pub fn route<S: NoteSink + ?Sized>(sink: &S, message: &[u8]) {
    if message.len() != 3 {
        return;
    }

    match LiveEvent::parse(message) {
        Ok(LiveEvent::Midi {
            message: MidiMessage::NoteOff { key, .. },
            ..
        }) => sink.note_off(key.as_int()),
        Ok(LiveEvent::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        }) => {
            if vel.as_int() == 0 {
                sink.note_off(key.as_int())
            } else {
                sink.note_on(key.as_int())
            }
        }
        Ok(_) => {}
        Err(e) => debug!(err = %e, "Dropping unparseable MIDI message."),
    }
}

/// Sends messages to at most one receiver. Setting a new receiver replaces
/// the previous one.
#[derive(Default)]
pub struct Transmitter {
    receiver: RwLock<Option<Arc<dyn Receiver>>>,
}

impl Transmitter {
    pub fn new() -> Transmitter {
        Transmitter::default()
    }

    /// Replaces the receiver, returning the previous one.
    pub fn set_receiver(&self, receiver: Option<Arc<dyn Receiver>>) -> Option<Arc<dyn Receiver>> {
        std::mem::replace(&mut *self.receiver.write(), receiver)
    }

    pub fn receiver(&self) -> Option<Arc<dyn Receiver>> {
        self.receiver.read().clone()
    }

    /// Forwards the message to the receiver, if there is one.
    pub fn transmit(&self, message: &[u8]) {
        // Clone out of the lock so a receiver may replace itself.
        let receiver = self.receiver();
        if let Some(receiver) = receiver {
            receiver.send(message);
        }
    }
}

/// A MIDI input device.
pub trait Device: fmt::Display + Send + Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Watches MIDI input for events and sends them to the given receiver.
    fn watch_events(&self, receiver: Arc<dyn Receiver>) -> Result<(), SynthError>;

    /// Stops watching events.
    fn stop_watch_events(&self);
}

/// Lists input devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, SynthError> {
    midir::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, SynthError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{NoteEvent, RecordingSink};

    #[test]
    fn test_route_notes() {
        let sink = RecordingSink::new();
        route(sink.as_ref(), &[0x90, 60, 100]);
        route(sink.as_ref(), &[0x80, 60, 64]);
        // Channel is ignored.
        route(sink.as_ref(), &[0x9F, 61, 1]);
        route(sink.as_ref(), &[0x8F, 61, 0]);
        assert_eq!(
            sink.events(),
            vec![
                NoteEvent::On(60),
                NoteEvent::Off(60),
                NoteEvent::On(61),
                NoteEvent::Off(61)
            ]
        );
    }

    #[test]
    fn test_route_zero_velocity_is_note_off() {
        let sink = RecordingSink::new();
        route(sink.as_ref(), &[0x90, 64, 0]);
        assert_eq!(sink.events(), vec![NoteEvent::Off(64)]);
    }

    #[test]
    fn test_route_drops_other_messages() {
        let sink = RecordingSink::new();
        // Control change, program change, pitch bend.
        route(sink.as_ref(), &[0xB0, 7, 100]);
        route(sink.as_ref(), &[0xC0, 5]);
        route(sink.as_ref(), &[0xE0, 0, 64]);
        // Wrong lengths.
        route(sink.as_ref(), &[0x90, 60]);
        route(sink.as_ref(), &[0x90, 60, 100, 0]);
        // Real time and garbage.
        route(sink.as_ref(), &[0xF8]);
        route(sink.as_ref(), &[0x10, 0x20, 0x30]);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_transmitter_replaces_receiver() {
        let transmitter = Transmitter::new();
        transmitter.transmit(&[0x90, 60, 100]);

        let first = RecordingSink::new();
        let second = RecordingSink::new();
        assert!(transmitter.set_receiver(Some(first.clone())).is_none());
        transmitter.transmit(&[0x90, 60, 100]);

        assert!(transmitter.set_receiver(Some(second.clone())).is_some());
        transmitter.transmit(&[0x80, 60, 0]);

        assert_eq!(first.events(), vec![NoteEvent::On(60)]);
        assert_eq!(second.events(), vec![NoteEvent::Off(60)]);

        transmitter.set_receiver(None);
        transmitter.transmit(&[0x90, 62, 100]);
        assert_eq!(second.events(), vec![NoteEvent::Off(60)]);
    }

    #[test]
    fn test_get_mock_device() {
        let device = get_device("mock-input").unwrap();
        assert_eq!(device.name(), "mock-input");
        assert_eq!(format!("{}", device), "mock-input (Mock)");
    }
}
