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
use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::info;

use super::Receiver;
use crate::error::SynthError;

/// A mock input device. Events only arrive through [Device::mock_event].
#[derive(Clone)]
pub struct Device {
    name: String,
    receiver: Arc<Mutex<Option<Arc<dyn Receiver>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            receiver: Arc::new(Mutex::new(None)),
        }
    }

    /// Delivers the event to the watching receiver. Returns false if nothing
    /// is watching.
    pub fn mock_event(&self, event: &[u8]) -> bool {
        let receiver = self.receiver.lock().clone();
        match receiver {
            Some(receiver) => {
                receiver.send(event);
                true
            }
            None => false,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.receiver.lock().is_some()
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, receiver: Arc<dyn Receiver>) -> Result<(), SynthError> {
        let mut current = self.receiver.lock();
        if current.is_some() {
            return Err(SynthError::Midi("already watching events".into()));
        }
        info!(device = self.name, "Watching MIDI events.");
        *current = Some(receiver);
        Ok(())
    }

    fn stop_watch_events(&self) {
        self.receiver.lock().take();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        midi::Device as _,
        testutil::{NoteEvent, RecordingSink},
    };

    #[test]
    fn test_watch_events() {
        let device = Device::get("mock");
        assert!(!device.mock_event(&[0x90, 60, 100]));

        let sink = RecordingSink::new();
        device.watch_events(sink.clone()).unwrap();
        assert!(device.watch_events(sink.clone()).is_err());
        assert!(device.is_watching());

        assert!(device.mock_event(&[0x90, 60, 100]));
        assert_eq!(sink.events(), vec![NoteEvent::On(60)]);

        device.stop_watch_events();
        assert!(!device.mock_event(&[0x80, 60, 0]));
        assert_eq!(sink.events(), vec![NoteEvent::On(60)]);
    }
}
