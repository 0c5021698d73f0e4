//! WAV decoding and encoding.
//!
//! Takes arrive with arbitrary channel counts and sample formats; everything
//! is reduced to mono 16-bit PCM. Artifacts are always written as 16-bit
//! mono WAV.

use crate::audio::pcm::{PcmAudio, downmix};
use crate::error::{BookvoiceError, Result};
use std::io::Cursor;
use std::path::Path;

/// Decode WAV bytes into mono PCM at the file's own sample rate.
pub fn decode_wav(bytes: &[u8]) -> Result<PcmAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| BookvoiceError::AudioDecode {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

    let spec = reader.spec();
    let read_err = |e: hound::Error| BookvoiceError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    };

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_err)?,
        (hound::SampleFormat::Int, bits) if bits <= 32 => {
            let shift = bits.saturating_sub(16) as u32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if bits < 16 {
                            (v << (16 - bits)) as i16
                        } else {
                            (v >> shift) as i16
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_err)?
        }
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_err)?,
        (format, bits) => {
            return Err(BookvoiceError::AudioDecode {
                message: format!("Unsupported WAV sample format {:?}/{} bits", format, bits),
            });
        }
    };

    Ok(PcmAudio::new(
        downmix(&interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

/// Read and decode a WAV file.
pub fn read_wav_file(path: &Path) -> Result<PcmAudio> {
    let bytes = std::fs::read(path)?;
    decode_wav(&bytes)
}

/// Encode mono PCM as a 16-bit WAV.
pub fn encode_wav(audio: &PcmAudio) -> Result<Vec<u8>> {
    let encode_err = |e: hound::Error| BookvoiceError::AudioEncode {
        message: format!("Failed to write WAV: {}", e),
    };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
        for &sample in &audio.samples {
            writer.write_sample(sample).map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)?;
    }
    Ok(cursor.into_inner())
}

/// Encoded size of a 16-bit mono WAV holding `samples` samples.
pub fn encoded_len(samples: usize) -> u64 {
    44 + samples as u64 * 2
}
