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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::debug;

/// Default priority for voice threads when SYNTHESKETCH_THREAD_PRIORITY is unset.
const DEFAULT_VOICE_THREAD_PRIORITY: u8 = 70;

/// Scheduling requested for voice playback threads. Read from the
/// environment once per voice pool, never from inside a playback loop.
#[derive(Debug, Clone, Copy)]
pub struct VoiceThreadPriority {
    priority: ThreadPriority,
    realtime: bool,
}

impl VoiceThreadPriority {
    /// Reads SYNTHESKETCH_THREAD_PRIORITY (0-99) and SYNTHESKETCH_DISABLE_RT_AUDIO.
    pub fn from_env() -> VoiceThreadPriority {
        VoiceThreadPriority {
            priority: voice_thread_priority(),
            realtime: rt_audio_enabled(),
        }
    }

    /// Applies the priority to the calling thread. Failures are logged and
    /// otherwise ignored; playback still works at normal priority.
    pub fn apply(&self) {
        let tp = self.priority;
        if let Err(e) = set_current_thread_priority(tp) {
            debug!(error = ?e, "Unable to raise voice thread priority");
        }

        #[cfg(unix)]
        if self.realtime {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            let tid = thread_native_id();
            if let Err(e) = set_thread_priority_and_policy(
                tid,
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                debug!(error = %e, "Failed to set RT SCHED_FIFO for voice thread");
            }
        }
    }
}

fn voice_thread_priority() -> ThreadPriority {
    std::env::var("SYNTHESKETCH_THREAD_PRIORITY")
        .ok()
        .and_then(|v| {
            let n = v.parse::<u8>().ok()?;
            (n < 100).then(|| ThreadPriorityValue::try_from(n).ok())?
        })
        .map(ThreadPriority::Crossplatform)
        .unwrap_or_else(default_priority)
}

fn default_priority() -> ThreadPriority {
    ThreadPriorityValue::try_from(DEFAULT_VOICE_THREAD_PRIORITY)
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether voice threads should attempt RT (SCHED_FIFO) scheduling.
/// Default: enabled. Opt out with SYNTHESKETCH_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("SYNTHESKETCH_DISABLE_RT_AUDIO")
}
