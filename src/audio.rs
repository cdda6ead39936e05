// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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

use crate::error::SynthError;

pub mod cpal;
pub mod format;
pub mod mock;
pub mod pcm;
pub mod thread_priority;

pub use format::{Encoding, OutputFormat};

/// An audio output device that can open several independent lines at once.
pub trait Device: fmt::Display + Send + Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Opens a line that accepts raw bytes in the given format. The line
    /// buffers at most `buffer_size` bytes before `write` blocks.
    fn open_line(
        &self,
        format: &OutputFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn Line>, SynthError>;
}

/// An opened output line. Lines are owned by exactly one voice and are
/// moved between the voice pool and its playback workers.
pub trait Line: Send {
    /// Starts consuming written audio.
    fn start(&mut self) -> Result<(), SynthError>;

    /// Writes the bytes to the line, blocking until all of them have been
    /// accepted by the device buffer. Returns the number of bytes written.
    fn write(&mut self, data: &[u8]) -> Result<usize, SynthError>;

    /// Blocks until every buffered byte has been played.
    fn drain(&mut self);

    /// Stops consuming audio. Buffered bytes are kept.
    fn stop(&mut self);

    /// Releases the line. No other call is valid afterwards.
    fn close(&mut self);
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, SynthError> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" return a
/// mock device, "default" returns the host's default output.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, SynthError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let device = get_device("mock-output").unwrap();
        assert_eq!(device.name(), "mock-output");
        assert_eq!(format!("{}", device), "mock-output (Mock)");
    }
}
