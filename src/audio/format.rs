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

use std::{fmt, str::FromStr};

use crate::error::SynthError;

/// Bit depths the encoder can produce.
pub const SUPPORTED_BIT_DEPTHS: [u16; 3] = [8, 16, 32];

/// Sample encoding of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Two's complement integer samples.
    PcmSigned,
    /// Offset-binary integer samples, silence at the midpoint.
    PcmUnsigned,
    /// Floating point samples.
    PcmFloat,
    /// Companded mu-law.
    ULaw,
    /// Companded A-law.
    ALaw,
}

impl Encoding {
    /// True for the integer PCM encodings the synthesizer can render.
    pub fn is_integer_pcm(self) -> bool {
        matches!(self, Encoding::PcmSigned | Encoding::PcmUnsigned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::PcmSigned => "pcm_signed",
            Encoding::PcmUnsigned => "pcm_unsigned",
            Encoding::PcmFloat => "pcm_float",
            Encoding::ULaw => "ulaw",
            Encoding::ALaw => "alaw",
        }
    }
}

impl FromStr for Encoding {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pcm_signed" | "signed" => Ok(Encoding::PcmSigned),
            "pcm_unsigned" | "unsigned" => Ok(Encoding::PcmUnsigned),
            "pcm_float" | "float" => Ok(Encoding::PcmFloat),
            "ulaw" => Ok(Encoding::ULaw),
            "alaw" => Ok(Encoding::ALaw),
            _ => Err(SynthError::unsupported(format!("unknown encoding: {}", s))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The format of every line opened for a synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Sample rate in Hz. Frames per second.
    pub sample_rate: u32,
    /// Bits per sample of a single channel.
    pub bits_per_sample: u16,
    /// Number of interleaved channels per frame.
    pub channels: u16,
    pub encoding: Encoding,
    pub big_endian: bool,
}

impl OutputFormat {
    /// Creates a new integer PCM format.
    pub fn new(
        sample_rate: u32,
        bits_per_sample: u16,
        channels: u16,
        signed: bool,
        big_endian: bool,
    ) -> OutputFormat {
        OutputFormat {
            sample_rate,
            bits_per_sample,
            channels,
            encoding: if signed {
                Encoding::PcmSigned
            } else {
                Encoding::PcmUnsigned
            },
            big_endian,
        }
    }

    /// Checks that the synthesizer can encode samples in this format. This
    /// happens before any device resource is touched.
    pub fn validate(&self) -> Result<(), SynthError> {
        if !self.encoding.is_integer_pcm() {
            return Err(SynthError::unsupported(format!(
                "only PCM encoding is currently supported, got {}",
                self.encoding
            )));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bits_per_sample) {
            return Err(SynthError::unsupported(format!(
                "only 8, 16 and 32 bit samples are currently supported, got {}",
                self.bits_per_sample
            )));
        }
        if self.channels != 1 && self.channels != 2 {
            return Err(SynthError::unsupported(format!(
                "only mono and stereo output is supported, got {} channels",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(SynthError::unsupported("sample rate must be greater than 0"));
        }
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        self.encoding == Encoding::PcmSigned
    }

    /// Bytes in one sample of one channel.
    pub fn sample_size(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes in one frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        self.sample_size() * self.channels as usize
    }

    /// Number of bytes holding `seconds` of audio, rounded down to whole frames.
    pub fn bytes_for(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64) as usize * self.frame_size()
    }
}

impl Default for OutputFormat {
    /// 44.1kHz, 16 bit, mono, signed, little endian.
    fn default() -> Self {
        OutputFormat::new(44100, 16, 1, true, false)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} bit, {} channel(s), {}, {}",
            self.sample_rate,
            self.bits_per_sample,
            self.channels,
            self.encoding,
            if self.big_endian {
                "big endian"
            } else {
                "little endian"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(
            Encoding::from_str("pcm_signed").unwrap(),
            Encoding::PcmSigned
        );
        assert_eq!(Encoding::from_str("Unsigned").unwrap(), Encoding::PcmUnsigned);
        assert_eq!(Encoding::from_str("ulaw").unwrap(), Encoding::ULaw);
        assert!(Encoding::from_str("mp3").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(OutputFormat::default().validate().is_ok());
        for bits in SUPPORTED_BIT_DEPTHS {
            assert!(OutputFormat::new(48000, bits, 2, false, true)
                .validate()
                .is_ok());
        }
    }

    #[test]
    fn test_validate_invalid() {
        let mut format = OutputFormat::new(44100, 24, 1, true, false);
        assert!(matches!(
            format.validate(),
            Err(SynthError::UnsupportedFormat(_))
        ));

        format.bits_per_sample = 16;
        format.encoding = Encoding::PcmFloat;
        assert!(matches!(
            format.validate(),
            Err(SynthError::UnsupportedFormat(_))
        ));

        format.encoding = Encoding::PcmSigned;
        format.channels = 3;
        assert!(format.validate().is_err());

        format.channels = 1;
        format.sample_rate = 0;
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_sizes() {
        let format = OutputFormat::new(44100, 16, 2, true, false);
        assert_eq!(format.sample_size(), 2);
        assert_eq!(format.frame_size(), 4);
        assert_eq!(format.bytes_for(0.05), 2205 * 4);

        let format = OutputFormat::new(8000, 32, 1, false, true);
        assert_eq!(format.frame_size(), 4);
        assert!(!format.is_signed());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", OutputFormat::default()),
            "44100 Hz, 16 bit, 1 channel(s), pcm_signed, little endian"
        );
    }
}
