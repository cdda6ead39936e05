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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cancel handle is given to a playback worker when it takes a voice. It's the worker's
/// responsibility to check it between writes and stop once it has been cancelled.
#[derive(Clone, Default)]
pub struct CancelHandle {
    /// Set if the underlying operation should stop.
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    /// Returns true if the handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the handle. Cancelling twice has no further effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    #[test]
    fn test_cancel_handle_cancelled() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                while !cancel_handle.is_cancelled() {
                    thread::yield_now();
                }
            })
        };

        cancel_handle.cancel();
        join.join().unwrap();
        assert!(cancel_handle.is_cancelled());

        // A second cancel is harmless.
        cancel_handle.cancel();
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_cancel_handles_are_independent() {
        let first = CancelHandle::new();
        let second = CancelHandle::new();
        first.cancel();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
