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

/// Errors raised while configuring output or talking to devices. Note events
/// never produce these; an unsatisfiable note is dropped silently.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// The format is not integer PCM with 8, 16 or 32 bit samples, or the
    /// device cannot open a line with it.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The device could not supply the requested number of lines.
    #[error("line unavailable: {0}")]
    LineUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A line or backend failed after it was opened.
    #[error("device error: {0}")]
    Device(String),

    #[error("MIDI error: {0}")]
    Midi(String),
}

impl SynthError {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        SynthError::UnsupportedFormat(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SynthError::InvalidArgument(msg.into())
    }
}
