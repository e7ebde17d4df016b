//! RIFF/WAVE container synthesis and parsing via `hound`.
//!
//! Reply audio from the inference service usually arrives as **raw PCM**
//! (16-bit little-endian, mono) with no container.  Before it can be decoded
//! or shipped anywhere that expects a playable file, a standard 44-byte
//! RIFF/WAVE header has to be synthesized around it: little-endian layout,
//! fixed PCM `fmt ` chunk, `data` chunk length equal to the payload length.
//!
//! # Example
//!
//! ```rust
//! use avatar_voice::audio::{synthesize_wav, parse_wav};
//!
//! let pcm: Vec<u8> = vec![0, 0, 255, 127]; // two 16-bit samples
//! let wav = synthesize_wav(&pcm, 24_000).unwrap();
//! assert_eq!(&wav[0..4], b"RIFF");
//!
//! let (samples, rate) = parse_wav(&wav).unwrap();
//! assert_eq!(rate, 24_000);
//! assert_eq!(samples, vec![0i16, 32_767]);
//! ```

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

/// Bit depth of every PCM payload this pipeline handles.
pub const PCM_BITS: u16 = 16;

// ---------------------------------------------------------------------------
// WavError
// ---------------------------------------------------------------------------

/// Errors from WAV container synthesis or parsing.
#[derive(Debug, Error)]
pub enum WavError {
    /// Raw PCM bytes must be whole 16-bit frames.
    #[error("raw PCM payload has odd length ({0} bytes)")]
    OddPcmLength(usize),

    /// Only 16-bit integer PCM is supported by this pipeline.
    #[error("unsupported WAV format: {bits} bit {format:?}")]
    UnsupportedFormat { bits: u16, format: SampleFormat },

    /// `hound` failed to write the container.
    #[error("WAV encode failed: {0}")]
    Encode(hound::Error),

    /// The byte buffer is not a parseable RIFF/WAVE container.
    #[error("WAV decode failed: {0}")]
    Decode(hound::Error),
}

// ---------------------------------------------------------------------------
// synthesize_wav
// ---------------------------------------------------------------------------

/// Wrap raw mono 16-bit little-endian PCM bytes in a RIFF/WAVE container.
///
/// The resulting buffer is `44 + pcm.len()` bytes: the canonical header
/// followed by the unmodified payload.  The declared `data` chunk length
/// always equals `pcm.len()`.
///
/// # Errors
///
/// Returns [`WavError::OddPcmLength`] when `pcm` is not a whole number of
/// 16-bit frames.
pub fn synthesize_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    if pcm.len() % 2 != 0 {
        return Err(WavError::OddPcmLength(pcm.len()));
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: PCM_BITS,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(WavError::Encode)?;
        for frame in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([frame[0], frame[1]]);
            writer.write_sample(sample).map_err(WavError::Encode)?;
        }
        writer.finalize().map_err(WavError::Encode)?;
    }

    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// parse_wav
// ---------------------------------------------------------------------------

/// Parse a RIFF/WAVE container into interleaved `i16` samples plus its
/// declared sample rate.
///
/// # Errors
///
/// Returns [`WavError::Decode`] when the buffer is not a valid container and
/// [`WavError::UnsupportedFormat`] for anything other than 16-bit integer
/// PCM.
pub fn parse_wav(bytes: &[u8]) -> Result<(Vec<i16>, u32), WavError> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(WavError::Decode)?;
    let spec = reader.spec();

    if spec.bits_per_sample != PCM_BITS || spec.sample_format != SampleFormat::Int {
        return Err(WavError::UnsupportedFormat {
            bits: spec.bits_per_sample,
            format: spec.sample_format,
        });
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(WavError::Decode)?;

    Ok((samples, spec.sample_rate))
}

/// Returns `true` when `bytes` starts with a RIFF/WAVE signature.
pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

// ---------------------------------------------------------------------------
// PCM sample conversions
// ---------------------------------------------------------------------------

/// Convert raw 16-bit little-endian PCM bytes to float samples in
/// `[-1.0, 1.0]`.
///
/// A trailing odd byte, if any, is ignored.
pub fn pcm16_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0)
        .collect()
}

/// Convert float samples in `[-1.0, 1.0]` to 16-bit little-endian PCM bytes.
///
/// Out-of-range inputs are clamped rather than wrapped.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    // ---- Header layout -----------------------------------------------------

    #[test]
    fn header_is_canonical_44_bytes() {
        let pcm = vec![0u8; 90];
        let wav = synthesize_wav(&pcm, 24_000).unwrap();

        assert_eq!(wav.len(), 44 + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(le_u32(&wav, 16), 16); // PCM fmt chunk size
        assert_eq!(&wav[36..40], b"data");
    }

    #[test]
    fn declared_data_length_matches_payload() {
        let pcm = vec![7u8; 1_000];
        let wav = synthesize_wav(&pcm, 24_000).unwrap();

        // data chunk length field sits right before the payload
        assert_eq!(le_u32(&wav, 40) as usize, pcm.len());
        // RIFF size = whole file minus the 8-byte RIFF preamble
        assert_eq!(le_u32(&wav, 4) as usize, 36 + pcm.len());
    }

    #[test]
    fn declared_sample_rate_is_preserved() {
        let wav = synthesize_wav(&[0u8; 4], 16_000).unwrap();
        assert_eq!(le_u32(&wav, 24), 16_000);
    }

    // ---- Round trip --------------------------------------------------------

    #[test]
    fn synthesized_container_round_trips_pcm_exactly() {
        // A ramp of distinct samples, so any reorder or drop is caught.
        let samples: Vec<i16> = (-500..500).map(|i| i * 30).collect();
        let mut pcm = Vec::new();
        for s in &samples {
            pcm.extend_from_slice(&s.to_le_bytes());
        }

        let wav = synthesize_wav(&pcm, 24_000).unwrap();
        let (decoded, rate) = parse_wav(&wav).unwrap();

        assert_eq!(rate, 24_000);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn empty_payload_round_trips() {
        let wav = synthesize_wav(&[], 24_000).unwrap();
        assert_eq!(wav.len(), 44);
        let (decoded, _) = parse_wav(&wav).unwrap();
        assert!(decoded.is_empty());
    }

    // ---- Error paths -------------------------------------------------------

    #[test]
    fn odd_length_pcm_is_rejected() {
        let err = synthesize_wav(&[1u8, 2, 3], 24_000).unwrap_err();
        assert!(matches!(err, WavError::OddPcmLength(3)));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        assert!(parse_wav(&[0u8; 64]).is_err());
        assert!(parse_wav(b"not a wav at all").is_err());
    }

    #[test]
    fn looks_like_wav_detects_signature() {
        let wav = synthesize_wav(&[0u8; 4], 24_000).unwrap();
        assert!(looks_like_wav(&wav));
        assert!(!looks_like_wav(b"RIFFxxxx????"));
        assert!(!looks_like_wav(&[0u8; 4]));
    }

    // ---- PCM conversions ---------------------------------------------------

    #[test]
    fn pcm16_f32_round_trip_is_close() {
        let original: Vec<f32> = (0..100).map(|i| (i as f32 / 100.0) - 0.5).collect();
        let bytes = f32_to_pcm16(&original);
        let back = pcm16_to_f32(&bytes);

        assert_eq!(back.len(), original.len());
        for (a, b) in original.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn f32_to_pcm16_clamps_out_of_range() {
        let bytes = f32_to_pcm16(&[2.0, -2.0]);
        let back = pcm16_to_f32(&bytes);
        assert!((back[0] - 1.0).abs() < 1e-3);
        assert!((back[1] + 1.0).abs() < 1e-3);
    }
}
