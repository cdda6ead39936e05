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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::debug;

use super::OutputFormat;
use crate::error::SynthError;

/// Number of lines a mock device hands out unless told otherwise.
const DEFAULT_MAX_LINES: usize = 64;

/// A mock device. Doesn't actually play anything, but paces writes to the
/// real-time duration of the written audio like a hardware line would.
#[derive(Clone)]
pub struct Device {
    name: String,
    max_lines: usize,
    max_channels: u16,
    open_lines: Arc<AtomicUsize>,
    bytes_written: Arc<AtomicU64>,
    fail_writes: Arc<AtomicBool>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            max_lines: DEFAULT_MAX_LINES,
            max_channels: 2,
            open_lines: Arc::new(AtomicUsize::new(0)),
            bytes_written: Arc::new(AtomicU64::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Limits how many lines may be open at the same time.
    pub fn with_max_lines(mut self, max_lines: usize) -> Device {
        self.max_lines = max_lines;
        self
    }

    /// Limits the channel count of formats the device accepts.
    pub fn with_max_channels(mut self, max_channels: u16) -> Device {
        self.max_channels = max_channels;
        self
    }

    /// Makes writes on every line of the device fail, or succeed again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of lines currently open.
    pub fn open_lines(&self) -> usize {
        self.open_lines.load(Ordering::SeqCst)
    }

    /// Returns the total number of bytes written across all lines.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open_line(
        &self,
        format: &OutputFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn super::Line>, SynthError> {
        if format.channels > self.max_channels {
            return Err(SynthError::unsupported(format!(
                "{} cannot open a line with format {}",
                self.name, format
            )));
        }

        self.open_lines
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                (open < self.max_lines).then_some(open + 1)
            })
            .map_err(|open| {
                SynthError::LineUnavailable(format!(
                    "{} has all {} lines in use",
                    self.name, open
                ))
            })?;

        debug!(device = self.name, buffer_size, "Opened mock line.");
        Ok(Box::new(Line {
            format: *format,
            open_lines: self.open_lines.clone(),
            bytes_written: self.bytes_written.clone(),
            fail_writes: self.fail_writes.clone(),
            started: false,
            closed: false,
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

/// A mock line.
struct Line {
    format: OutputFormat,
    open_lines: Arc<AtomicUsize>,
    bytes_written: Arc<AtomicU64>,
    fail_writes: Arc<AtomicBool>,
    started: bool,
    closed: bool,
}

impl super::Line for Line {
    fn start(&mut self) -> Result<(), SynthError> {
        if self.closed {
            return Err(SynthError::Device("line is closed".into()));
        }
        self.started = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SynthError> {
        if self.closed {
            return Err(SynthError::Device("line is closed".into()));
        }
        if !self.started {
            return Err(SynthError::Device("line is not started".into()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SynthError::Device("mock write failure".into()));
        }

        let frames = data.len() / self.format.frame_size();
        spin_sleep::sleep(Duration::from_secs_f64(
            frames as f64 / self.format.sample_rate as f64,
        ));
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::SeqCst);
        Ok(data.len())
    }

    fn drain(&mut self) {}

    fn stop(&mut self) {
        self.started = false;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.started = false;
            self.open_lines.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        super::Line::close(self);
    }
}
