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
use std::{fmt, mem, sync::Arc};

use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::Receiver;
use crate::error::SynthError;

fn midi_error(e: impl fmt::Display) -> SynthError {
    SynthError::Midi(e.to_string())
}

pub struct Device {
    name: String,
    input_port: MidiInputPort,
    event_connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, receiver: Arc<dyn Receiver>) -> Result<(), SynthError> {
        let span = span!(Level::INFO, "watch events (midir)");
        let _enter = span.enter();

        let mut event_connection = self.event_connection.lock();
        if event_connection.is_some() {
            return Err(SynthError::Midi("already watching events".into()));
        }

        info!(device = self.name, "Watching MIDI events.");

        let input = MidiInput::new("synthesketch input").map_err(midi_error)?;
        *event_connection = Some(
            input
                .connect(
                    &self.input_port,
                    "synthesketch input watcher",
                    move |_, raw_event, _| {
                        debug!(event = ?raw_event, "Received MIDI event.");
                        receiver.send(raw_event);
                    },
                    (),
                )
                .map_err(midi_error)?,
        );

        Ok(())
    }

    fn stop_watch_events(&self) {
        // Explicitly drop the connection.
        let event_connection = self.event_connection.lock().take();
        if event_connection.is_some() {
            info!(device = self.name, "Stopped watching MIDI events.");
        }
        mem::drop(event_connection);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Input)", self.name)
    }
}

/// Lists midir input devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, SynthError> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir input devices.
fn list_midir_devices() -> Result<Vec<Device>, SynthError> {
    let input = MidiInput::new("synthesketch input listing").map_err(midi_error)?;

    let mut devices = Vec::new();
    for port in input.ports() {
        let name = input.port_name(&port).map_err(midi_error)?;
        if devices.iter().any(|device: &Device| device.name == name) {
            continue;
        }
        devices.push(Device {
            name,
            input_port: port,
            event_connection: Mutex::new(None),
        });
    }

    devices.sort_by_key(|device| device.name.clone());
    Ok(devices)
}

/// Gets the midir device whose name contains the given name.
pub fn get(name: &str) -> Result<Device, SynthError> {
    let mut matches = list_midir_devices()?
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    if matches.is_empty() {
        return Err(SynthError::Midi(format!("no device found with name {}", name)));
    }
    if matches.len() > 1 {
        return Err(SynthError::Midi(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|device| device.name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )));
    }

    Ok(matches.swap_remove(0))
}
