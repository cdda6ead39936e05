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

//! Conversion between normalized float samples and raw integer PCM bytes.

use super::format::OutputFormat;
use crate::error::SynthError;

/// Every sample is divided by this before quantizing, leaving headroom for
/// several voices sounding at once.
pub const VOLUME_DIVISOR: f64 = 4.0;

/// Largest positive integer value for the given bit depth.
fn max_value(bits_per_sample: u16) -> f64 {
    match bits_per_sample {
        8 => i8::MAX as f64,
        16 => i16::MAX as f64,
        _ => i32::MAX as f64,
    }
}

/// Encodes samples in [-1, 1] into PCM bytes. Each sample is written once
/// per channel. The format is validated before anything is written.
pub fn encode(samples: &[f64], format: &OutputFormat) -> Result<Vec<u8>, SynthError> {
    format.validate()?;

    let scale = max_value(format.bits_per_sample) / VOLUME_DIVISOR;
    let signed = format.is_signed();
    let mut bytes = Vec::with_capacity(samples.len() * format.frame_size());

    for &sample in samples {
        let scaled = sample * scale;
        for _ in 0..format.channels {
            match format.bits_per_sample {
                8 => {
                    let value = scaled as i8 as u8;
                    bytes.push(if signed { value } else { value ^ 0x80 });
                }
                16 => {
                    let value = scaled as i16 as u16;
                    let value = if signed { value } else { value ^ 0x8000 };
                    if format.big_endian {
                        bytes.extend_from_slice(&value.to_be_bytes());
                    } else {
                        bytes.extend_from_slice(&value.to_le_bytes());
                    }
                }
                _ => {
                    let value = scaled as i32 as u32;
                    let value = if signed { value } else { value ^ 0x8000_0000 };
                    if format.big_endian {
                        bytes.extend_from_slice(&value.to_be_bytes());
                    } else {
                        bytes.extend_from_slice(&value.to_le_bytes());
                    }
                }
            }
        }
    }

    Ok(bytes)
}

/// Reads one sample of one channel as a signed integer, undoing the
/// unsigned bias. `bytes` must hold exactly one sample.
pub fn read_sample(bytes: &[u8], format: &OutputFormat) -> i32 {
    let signed = format.is_signed();
    match bytes.len() {
        1 => {
            let raw = if signed { bytes[0] } else { bytes[0] ^ 0x80 };
            raw as i8 as i32
        }
        2 => {
            let raw = [bytes[0], bytes[1]];
            let value = if format.big_endian {
                u16::from_be_bytes(raw)
            } else {
                u16::from_le_bytes(raw)
            };
            let value = if signed { value } else { value ^ 0x8000 };
            value as i16 as i32
        }
        _ => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            let value = if format.big_endian {
                u32::from_be_bytes(raw)
            } else {
                u32::from_le_bytes(raw)
            };
            let value = if signed { value } else { value ^ 0x8000_0000 };
            value as i32
        }
    }
}

/// Decodes PCM bytes back into normalized samples, reading the first
/// channel of every frame and reversing the volume scaling. Trailing bytes
/// that do not form a whole frame are ignored.
pub fn decode(bytes: &[u8], format: &OutputFormat) -> Result<Vec<f64>, SynthError> {
    format.validate()?;

    let scale = max_value(format.bits_per_sample) / VOLUME_DIVISOR;
    let sample_size = format.sample_size();
    Ok(bytes
        .chunks_exact(format.frame_size())
        .map(|frame| read_sample(&frame[..sample_size], format) as f64 / scale)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::audio::format::Encoding;

    fn all_formats() -> Vec<OutputFormat> {
        let mut formats = Vec::new();
        for bits in [8, 16, 32] {
            for channels in [1, 2] {
                for signed in [true, false] {
                    for big_endian in [true, false] {
                        formats.push(OutputFormat::new(44100, bits, channels, signed, big_endian));
                    }
                }
            }
        }
        formats
    }

    fn zero_sample(format: &OutputFormat) -> Vec<u8> {
        let size = format.sample_size();
        let mut zero = vec![0u8; size];
        if !format.is_signed() {
            let msb = if format.big_endian { 0 } else { size - 1 };
            zero[msb] = 0x80;
        }
        zero
    }

    #[test]
    fn test_encode_silence() -> Result<(), Box<dyn Error>> {
        for format in all_formats() {
            let bytes = encode(&[0.0; 16], &format)?;
            assert_eq!(bytes.len(), 16 * format.frame_size());
            let zero = zero_sample(&format);
            for sample in bytes.chunks_exact(format.sample_size()) {
                assert_eq!(sample, zero.as_slice(), "format {}", format);
            }
        }
        Ok(())
    }

    #[test]
    fn test_encode_decode_within_one_step() -> Result<(), Box<dyn Error>> {
        let input = 1.0 / VOLUME_DIVISOR;
        for format in all_formats() {
            let bytes = encode(&[input, -input, 1.0, -1.0], &format)?;
            let decoded = decode(&bytes, &format)?;
            let step = VOLUME_DIVISOR / max_value(format.bits_per_sample);
            assert_eq!(decoded.len(), 4);
            for (expected, actual) in [input, -input, 1.0, -1.0].iter().zip(decoded.iter()) {
                assert!(
                    (expected - actual).abs() <= step,
                    "format {}: {} vs {}",
                    format,
                    expected,
                    actual
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_encode_byte_order() -> Result<(), Box<dyn Error>> {
        let little = OutputFormat::new(44100, 16, 1, true, false);
        let big = OutputFormat::new(44100, 16, 1, true, true);
        // 1.0 * 32767 / 4 truncates to 8191 = 0x1FFF.
        assert_eq!(encode(&[1.0], &little)?, vec![0xFF, 0x1F]);
        assert_eq!(encode(&[1.0], &big)?, vec![0x1F, 0xFF]);

        let unsigned = OutputFormat::new(44100, 16, 1, false, true);
        assert_eq!(encode(&[1.0], &unsigned)?, vec![0x9F, 0xFF]);
        Ok(())
    }

    #[test]
    fn test_encode_duplicates_channels() -> Result<(), Box<dyn Error>> {
        let format = OutputFormat::new(44100, 8, 2, true, false);
        // 0.5 * 127 / 4 truncates to 15.
        assert_eq!(encode(&[0.5, -0.5], &format)?, vec![15, 15, 0xF1, 0xF1]);
        Ok(())
    }

    #[test]
    fn test_encode_truncates_toward_zero() -> Result<(), Box<dyn Error>> {
        let format = OutputFormat::new(44100, 8, 1, true, false);
        // -1.0 * 127 / 4 = -31.75 -> -31.
        assert_eq!(encode(&[-1.0], &format)?, vec![(-31i8) as u8]);
        Ok(())
    }

    #[test]
    fn test_encode_unsupported() {
        let mut format = OutputFormat::new(44100, 24, 1, true, false);
        assert!(matches!(
            encode(&[0.0], &format),
            Err(SynthError::UnsupportedFormat(_))
        ));

        format.bits_per_sample = 16;
        format.encoding = Encoding::ALaw;
        assert!(matches!(
            encode(&[0.0], &format),
            Err(SynthError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_wav_round_trip() -> Result<(), Box<dyn Error>> {
        let format = OutputFormat::new(22050, 16, 1, true, false);
        let samples = crate::waveform::sine(441);
        let bytes = encode(&samples, &format)?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)?;
        for chunk in bytes.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize()?;

        let mut reader = hound::WavReader::open(&path)?;
        let read: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(read.len(), samples.len());

        let peak = read.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert_eq!(peak, (i16::MAX as f64 / VOLUME_DIVISOR) as u16);
        Ok(())
    }
}
