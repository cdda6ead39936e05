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

//! Plays notes from a computer keyboard.
//!
//! Two rows of keys act as a piano keyboard: the bottom row (Z to M, with
//! S, G and friends as the black keys) covers A2 to G3, and the top rows
//! (1 to P) continue from G#3 up to C5.

use std::collections::BTreeSet;

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use parking_lot::Mutex;
use tracing::debug;

use super::{Receiver, Transmitter};

/// Velocity of every note the keyboard plays.
pub const KEY_VELOCITY: u8 = 75;

const KEY_MAP: [(char, u8); 28] = [
    ('z', 45),
    ('s', 46),
    ('x', 47),
    ('c', 48),
    ('f', 49),
    ('v', 50),
    ('g', 51),
    ('b', 52),
    ('n', 53),
    ('j', 54),
    ('m', 55),
    ('1', 56),
    ('q', 57),
    ('2', 58),
    ('w', 59),
    ('e', 60),
    ('4', 61),
    ('r', 62),
    ('5', 63),
    ('t', 64),
    ('y', 65),
    ('7', 66),
    ('u', 67),
    ('8', 68),
    ('i', 69),
    ('9', 70),
    ('o', 71),
    ('p', 72),
];

/// Returns the note played by the key, if it is mapped. Letters are case
/// insensitive.
pub fn key_note(key: char) -> Option<u8> {
    let key = key.to_ascii_lowercase();
    KEY_MAP
        .iter()
        .find(|(mapped, _)| *mapped == key)
        .map(|(_, note)| *note)
}

/// Turns key presses into MIDI messages. Messages received from elsewhere
/// are passed through to the same transmitter.
pub struct Keyboard {
    transmitter: Transmitter,
    channel: u4,
    held: Mutex<BTreeSet<u8>>,
}

impl Default for Keyboard {
    fn default() -> Self {
        Keyboard::new(0)
    }
}

impl Keyboard {
    /// Creates a keyboard that plays on the given MIDI channel (0-15).
    pub fn new(channel: u8) -> Keyboard {
        Keyboard {
            transmitter: Transmitter::new(),
            channel: u4::new(channel & 0x0F),
            held: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Presses the key. Returns false if the key is unmapped or already down.
    pub fn key_pressed(&self, key: char) -> bool {
        let Some(note) = key_note(key) else {
            return false;
        };
        if !self.held.lock().insert(note) {
            return false;
        }
        self.emit(MidiMessage::NoteOn {
            key: u7::new(note),
            vel: u7::new(KEY_VELOCITY),
        });
        true
    }

    /// Releases the key. Returns false if the key is unmapped or not down.
    pub fn key_released(&self, key: char) -> bool {
        let Some(note) = key_note(key) else {
            return false;
        };
        if !self.held.lock().remove(&note) {
            return false;
        }
        self.emit(MidiMessage::NoteOff {
            key: u7::new(note),
            vel: u7::new(0),
        });
        true
    }

    /// Presses the key if it is up, releases it if it is down.
    pub fn key_toggled(&self, key: char) -> bool {
        match key_note(key) {
            Some(note) if self.held.lock().contains(&note) => self.key_released(key),
            Some(_) => self.key_pressed(key),
            None => false,
        }
    }

    /// Releases every held key.
    pub fn release_all(&self) {
        let held = std::mem::take(&mut *self.held.lock());
        for note in held {
            self.emit(MidiMessage::NoteOff {
                key: u7::new(note),
                vel: u7::new(0),
            });
        }
    }

    /// Notes currently held down, in ascending order.
    pub fn held_notes(&self) -> Vec<u8> {
        self.held.lock().iter().copied().collect()
    }

    fn emit(&self, message: MidiMessage) {
        let event = LiveEvent::Midi {
            channel: self.channel,
            message,
        };
        let mut buf: Vec<u8> = Vec::with_capacity(3);
        if event.write(&mut buf).is_ok() {
            debug!(event = ?event, "Keyboard event.");
            self.transmitter.transmit(&buf);
        }
    }
}

impl Receiver for Keyboard {
    fn send(&self, message: &[u8]) {
        self.transmitter.transmit(message);
    }
}
