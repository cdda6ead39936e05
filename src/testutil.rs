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

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::midi::{NoteSink, Receiver};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        // Exponential backoff to reduce CPU contention
        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

/// A note event observed by a [RecordingSink].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    On(u8),
    Off(u8),
}

/// Records note events and raw messages it is handed.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NoteEvent>>,
    messages: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<RecordingSink> {
        Arc::new(RecordingSink::default())
    }

    pub fn events(&self) -> Vec<NoteEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages.lock().clone()
    }
}

impl NoteSink for RecordingSink {
    fn note_on(&self, note: u8) {
        self.events.lock().push(NoteEvent::On(note));
    }

    fn note_off(&self, note: u8) {
        self.events.lock().push(NoteEvent::Off(note));
    }
}

impl Receiver for RecordingSink {
    fn send(&self, message: &[u8]) {
        self.messages.lock().push(message.to_vec());
        crate::midi::route(self, message);
    }
}
