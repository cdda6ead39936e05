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
    collections::VecDeque,
    fmt,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, span, Level};

use super::{Device as AudioDevice, Line as AudioLine, OutputFormat};
use crate::error::SynthError;

/// How long a blocked writer or drainer sleeps before re-checking the line
/// state. Bounds how long a close can go unnoticed.
const WAIT_SLICE: Duration = Duration::from_millis(20);

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, SynthError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices with at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, SynthError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(|e| SynthError::Device(e.to_string()))?;
        let _shh_stderr = shh::stderr().map_err(|e| SynthError::Device(e.to_string()))?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = e.to_string(), host = host_id.name(), "Host unavailable");
                    continue;
                }
            };
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|config| config.channels())
            .max()
            .unwrap_or(0);
        if max_channels == 0 {
            return None;
        }

        Some(Device {
            name: device.name().ok()?,
            max_channels,
            host_id,
            device,
        })
    }

    /// Gets the given cpal device. "default" is the default host's default
    /// output device.
    pub fn get(name: &str) -> Result<Device, SynthError> {
        if name == "default" {
            let host = cpal::default_host();
            return host
                .default_output_device()
                .and_then(|device| Device::from_cpal(host.id(), device))
                .ok_or_else(|| SynthError::Device("no default output device".into()));
        }

        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| SynthError::Device(format!("no device found with name {}", name)))
    }

    /// Checks whether the device advertises an output config for the format.
    fn supports(&self, format: &OutputFormat, sample_format: cpal::SampleFormat) -> bool {
        let configs = match self.device.supported_output_configs() {
            Ok(configs) => configs,
            Err(e) => {
                error!(err = e.to_string(), device = self.name, "Unable to query configs");
                return false;
            }
        };

        let mut configs = configs;
        configs.any(|config| {
            config.channels() == format.channels
                && config.sample_format() == sample_format
                && config.min_sample_rate().0 <= format.sample_rate
                && config.max_sample_rate().0 >= format.sample_rate
        })
    }
}

impl AudioDevice for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open_line(
        &self,
        format: &OutputFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn AudioLine>, SynthError> {
        format.validate()?;
        let sample_format = match (format.bits_per_sample, format.is_signed()) {
            (8, true) => cpal::SampleFormat::I8,
            (8, false) => cpal::SampleFormat::U8,
            (16, true) => cpal::SampleFormat::I16,
            (16, false) => cpal::SampleFormat::U16,
            (32, true) => cpal::SampleFormat::I32,
            _ => cpal::SampleFormat::U32,
        };

        if !self.supports(format, sample_format) {
            return Err(SynthError::unsupported(format!(
                "{} cannot open a line with format {}",
                self.name, format
            )));
        }

        let line = Line::open(
            self.name.clone(),
            self.device.clone(),
            *format,
            sample_format,
            buffer_size,
        )?;
        Ok(Box::new(line))
    }
}

/// Raw conversion from the line's wire bytes into the matching cpal sample
/// type. The stream type is chosen from the format, so widths always agree.
trait FromPcm: Sized {
    fn from_pcm(bytes: &[u8], big_endian: bool) -> Self;
}

macro_rules! impl_from_pcm {
    ($($t:ty),*) => {
        $(
            impl FromPcm for $t {
                fn from_pcm(bytes: &[u8], big_endian: bool) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    if big_endian {
                        <$t>::from_be_bytes(raw)
                    } else {
                        <$t>::from_le_bytes(raw)
                    }
                }
            }
        )*
    };
}

impl_from_pcm!(i8, u8, i16, u16, i32, u32);

/// Byte queue shared between a line and its stream callback.
struct Queue {
    bytes: VecDeque<u8>,
    capacity: usize,
    running: bool,
    closed: bool,
    error: Option<String>,
}

struct Shared {
    queue: Mutex<Queue>,
    changed: Condvar,
}

/// A line backed by its own cpal output stream. The stream lives on a
/// dedicated thread because cpal streams cannot move between threads on
/// every platform.
struct Line {
    device_name: String,
    shared: Arc<Shared>,
    close_tx: Option<crossbeam_channel::Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl Line {
    fn open(
        device_name: String,
        device: cpal::Device,
        format: OutputFormat,
        sample_format: cpal::SampleFormat,
        buffer_size: usize,
    ) -> Result<Line, SynthError> {
        let capacity = buffer_size.max(format.frame_size());
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                bytes: VecDeque::with_capacity(capacity),
                capacity,
                running: false,
                closed: false,
                error: None,
            }),
            changed: Condvar::new(),
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(1);

        let stream_shared = shared.clone();
        let stream_thread = thread::Builder::new()
            .name("cpal-line".into())
            .spawn(move || {
                let config = cpal::StreamConfig {
                    channels: format.channels,
                    sample_rate: cpal::SampleRate(format.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream = match sample_format {
                    cpal::SampleFormat::I8 => {
                        build_stream::<i8>(&device, &config, stream_shared, format)
                    }
                    cpal::SampleFormat::U8 => {
                        build_stream::<u8>(&device, &config, stream_shared, format)
                    }
                    cpal::SampleFormat::I16 => {
                        build_stream::<i16>(&device, &config, stream_shared, format)
                    }
                    cpal::SampleFormat::U16 => {
                        build_stream::<u16>(&device, &config, stream_shared, format)
                    }
                    cpal::SampleFormat::I32 => {
                        build_stream::<i32>(&device, &config, stream_shared, format)
                    }
                    _ => build_stream::<u32>(&device, &config, stream_shared, format),
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the line is closed.
                let _ = close_rx.recv();
                drop(stream);
            })
            .map_err(|e| SynthError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(device = device_name, "Opened cpal line.");
                Ok(Line {
                    device_name,
                    shared,
                    close_tx: Some(close_tx),
                    stream_thread: Some(stream_thread),
                })
            }
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                Err(SynthError::LineUnavailable(format!(
                    "{} could not open an output stream: {}",
                    device_name, e
                )))
            }
            Err(_) => {
                let _ = stream_thread.join();
                Err(SynthError::LineUnavailable(format!(
                    "{} stream thread exited before starting",
                    device_name
                )))
            }
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Shared>,
    format: OutputFormat,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + FromPcm + Send + 'static,
{
    let sample_size = format.sample_size();
    let error_shared = shared.clone();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut queue = shared.queue.lock();
            let mut sample = [0u8; 4];
            for slot in data.iter_mut() {
                if queue.running && queue.bytes.len() >= sample_size {
                    for byte in sample[..sample_size].iter_mut() {
                        *byte = queue.bytes.pop_front().unwrap_or(0);
                    }
                    *slot = T::from_pcm(&sample[..sample_size], format.big_endian);
                } else {
                    *slot = T::EQUILIBRIUM;
                }
            }
            drop(queue);
            shared.changed.notify_all();
        },
        move |err| {
            error!("CPAL output stream error: {}", err);
            error_shared.queue.lock().error = Some(err.to_string());
            error_shared.changed.notify_all();
        },
        None,
    )
}

impl AudioLine for Line {
    fn start(&mut self) -> Result<(), SynthError> {
        let mut queue = self.shared.queue.lock();
        if queue.closed {
            return Err(SynthError::Device("line is closed".into()));
        }
        queue.running = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SynthError> {
        let mut written = 0;
        let mut queue = self.shared.queue.lock();
        while written < data.len() {
            if queue.closed {
                return Err(SynthError::Device("line is closed".into()));
            }
            if let Some(e) = &queue.error {
                return Err(SynthError::Device(e.clone()));
            }

            let space = queue.capacity.saturating_sub(queue.bytes.len());
            if space == 0 {
                self.shared.changed.wait_for(&mut queue, WAIT_SLICE);
                continue;
            }

            let n = space.min(data.len() - written);
            queue.bytes.extend(&data[written..written + n]);
            written += n;
        }
        Ok(written)
    }

    fn drain(&mut self) {
        let mut queue = self.shared.queue.lock();
        while queue.running && !queue.closed && queue.error.is_none() && !queue.bytes.is_empty()
        {
            self.shared.changed.wait_for(&mut queue, WAIT_SLICE);
        }
    }

    fn stop(&mut self) {
        self.shared.queue.lock().running = false;
        self.shared.changed.notify_all();
    }

    fn close(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return;
            }
            queue.closed = true;
            queue.running = false;
            queue.bytes.clear();
        }
        self.shared.changed.notify_all();

        let span = span!(Level::DEBUG, "close line (cpal)");
        let _enter = span.enter();
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        if let Some(stream_thread) = self.stream_thread.take() {
            if stream_thread.join().is_err() {
                error!(device = self.device_name, "Stream thread panicked.");
            }
        }
        info!(device = self.device_name, "Closed cpal line.");
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pcm() {
        assert_eq!(i16::from_pcm(&[0xFF, 0x1F], false), 0x1FFF);
        assert_eq!(i16::from_pcm(&[0x1F, 0xFF], true), 0x1FFF);
        assert_eq!(u8::from_pcm(&[0x80], false), 0x80);
        assert_eq!(i8::from_pcm(&[0xF1], true), -15);
        assert_eq!(u32::from_pcm(&[0x80, 0, 0, 0], true), 0x8000_0000);
        assert_eq!(i32::from_pcm(&[1, 0, 0, 0], false), 1);
    }
}
