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

//! A fixed pool of playback voices.
//!
//! Every voice owns one output line for the lifetime of the pool. A voice is
//! either idle, or owned by a playback worker thread that loops a note's
//! buffer into the line until it is cancelled. Workers hand their voice back
//! to the idle queue themselves once they have observed the cancel.

use std::{
    collections::{BTreeMap, VecDeque},
    mem,
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use super::table::MAX_BUFFER_DURATION;
use crate::{
    audio::{thread_priority::VoiceThreadPriority, Device, Line, OutputFormat},
    error::SynthError,
    playsync::CancelHandle,
};

/// A voice and the line it plays into.
struct Voice {
    id: usize,
    line: Box<dyn Line>,
}

/// A voice currently owned by a worker that has not been told to stop.
struct ActiveVoice {
    voice_id: usize,
    cancel_handle: CancelHandle,
}

#[derive(Default)]
struct Partitions {
    /// Voices waiting for a note.
    idle: VecDeque<Voice>,
    /// Voices sounding a note, keyed by that note.
    active: BTreeMap<u8, ActiveVoice>,
    /// Every worker that may still own a voice, including stopped ones that
    /// are still draining.
    workers: Vec<JoinHandle<()>>,
    /// Set once teardown starts. No new workers are spawned afterwards.
    closed: bool,
}

/// A bounded set of voices. At most one voice sounds any given note.
pub struct VoicePool {
    partitions: Arc<Mutex<Partitions>>,
    capacity: usize,
    format: OutputFormat,
    priority: VoiceThreadPriority,
}

impl VoicePool {
    /// Opens `voice_count` lines on the device. If any line cannot be opened,
    /// the ones already opened are closed before the error is returned.
    pub fn open(
        device: &dyn Device,
        format: &OutputFormat,
        voice_count: usize,
    ) -> Result<VoicePool, SynthError> {
        format.validate()?;
        if voice_count < 1 {
            return Err(SynthError::invalid("voice count must be at least 1"));
        }

        let span = span!(Level::INFO, "open voices", device = device.name());
        let _enter = span.enter();

        let buffer_size = format.bytes_for(MAX_BUFFER_DURATION);
        let mut idle = VecDeque::with_capacity(voice_count);
        for id in 0..voice_count {
            match device.open_line(format, buffer_size) {
                Ok(line) => idle.push_back(Voice { id, line }),
                Err(e) => {
                    error!(
                        err = %e,
                        opened = idle.len(),
                        requested = voice_count,
                        "Unable to open voice line."
                    );
                    for mut voice in idle {
                        voice.line.close();
                    }
                    return Err(e);
                }
            }
        }

        info!(voices = voice_count, format = %format, buffer_size, "Opened voices.");
        Ok(VoicePool {
            partitions: Arc::new(Mutex::new(Partitions {
                idle,
                ..Default::default()
            })),
            capacity: voice_count,
            format: *format,
            priority: VoiceThreadPriority::from_env(),
        })
    }

    /// Starts looping the buffer on an idle voice. Does nothing if the note
    /// is already sounding or every voice is busy.
    pub fn note_on(&self, note: u8, buffer: Arc<[u8]>) {
        let mut partitions = self.partitions.lock();
        if partitions.closed || partitions.active.contains_key(&note) {
            return;
        }
        partitions.workers.retain(|worker| !worker.is_finished());

        let Some(voice) = partitions.idle.pop_front() else {
            debug!(note, "No idle voice, dropping note.");
            return;
        };

        let voice_id = voice.id;
        let cancel_handle = CancelHandle::new();
        let worker = {
            let cancel_handle = cancel_handle.clone();
            let partitions = self.partitions.clone();
            let priority = self.priority;
            thread::Builder::new()
                .name(format!("voice-{}", voice_id))
                .spawn(move || play(voice, note, buffer, cancel_handle, partitions, priority))
        };

        match worker {
            Ok(worker) => {
                partitions.workers.push(worker);
                partitions.active.insert(
                    note,
                    ActiveVoice {
                        voice_id,
                        cancel_handle,
                    },
                );
            }
            Err(e) => error!(err = %e, voice = voice_id, "Unable to spawn voice worker."),
        }
    }

    /// Stops the voice sounding the note, if any. The voice becomes idle
    /// again once its worker has drained the line.
    pub fn note_off(&self, note: u8) {
        if let Some(active) = self.partitions.lock().active.remove(&note) {
            active.cancel_handle.cancel();
        }
    }

    /// Stops every voice, waits for all workers and closes every line.
    pub fn teardown(&self) {
        let span = span!(Level::INFO, "voice teardown");
        let _enter = span.enter();

        let workers = {
            let mut partitions = self.partitions.lock();
            if partitions.closed {
                return;
            }
            partitions.closed = true;
            for (_, active) in mem::take(&mut partitions.active) {
                active.cancel_handle.cancel();
            }
            mem::take(&mut partitions.workers)
        };

        for worker in workers {
            if worker.join().is_err() {
                error!("Voice worker panicked.");
            }
        }

        let idle = mem::take(&mut self.partitions.lock().idle);
        let closed = idle.len();
        for mut voice in idle {
            voice.line.close();
        }
        info!(closed, capacity = self.capacity, "Closed voices.");
    }

    /// Notes currently sounding, in ascending order.
    pub fn active_notes(&self) -> Vec<u8> {
        self.partitions.lock().active.keys().copied().collect()
    }

    pub fn idle_count(&self) -> usize {
        self.partitions.lock().idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    #[cfg(test)]
    fn voice_id(&self, note: u8) -> Option<usize> {
        self.partitions
            .lock()
            .active
            .get(&note)
            .map(|active| active.voice_id)
    }
}

impl Drop for VoicePool {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The body of a playback worker.
fn play(
    mut voice: Voice,
    note: u8,
    buffer: Arc<[u8]>,
    cancel_handle: CancelHandle,
    partitions: Arc<Mutex<Partitions>>,
    priority: VoiceThreadPriority,
) {
    priority.apply();

    let span = span!(Level::DEBUG, "voice", id = voice.id, note);
    let _enter = span.enter();

    match voice.line.start() {
        Ok(()) => {
            debug!("Voice started.");
            while !cancel_handle.is_cancelled() {
                if let Err(e) = voice.line.write(&buffer) {
                    warn!(err = %e, "Voice write failed, stopping.");
                    break;
                }
            }
            voice.line.drain();
            voice.line.stop();
        }
        Err(e) => warn!(err = %e, "Unable to start voice line."),
    }

    let mut partitions = partitions.lock();
    // A failed write ends the worker without a note-off; forget the note so
    // it can be played again.
    if partitions
        .active
        .get(&note)
        .is_some_and(|active| active.voice_id == voice.id)
    {
        partitions.active.remove(&note);
    }
    debug!("Voice idle.");
    partitions.idle.push_back(voice);
}
