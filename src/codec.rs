//! WAV encoding of rendered audio, and decoding of uploaded clips.

use std::io::Cursor;

use crate::buffer::AudioBuffer;
use crate::error::DecodeError;

const BITS_PER_SAMPLE: u16 = 16;
pub const WAV_HEADER_LEN: usize = 44;

/// Convert one float sample to 16-bit PCM. Positive samples scale by 32767,
/// negative by 32768, after clamping to [-1, 1].
#[inline]
pub fn sample_to_i16(s: f32) -> i16 {
    let s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
    if s >= 0.0 {
        (s * 32767.0).round() as i16
    } else {
        (s * 32768.0).round() as i16
    }
}

/// Encode a buffer as a 16-bit PCM WAV byte stream with a 44-byte header.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let bytes_per_sample = BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * channels as u32 * bytes_per_sample as u32;
    let block_align = channels * bytes_per_sample;
    let data_size = (buffer.frames() * channels as usize * bytes_per_sample as usize) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    let planar = buffer.channels();
    for i in 0..buffer.frames() {
        for ch in planar {
            buf.extend_from_slice(&sample_to_i16(ch[i]).to_le_bytes());
        }
    }

    buf
}

/// Turns encoded bytes into a planar float buffer.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError>;
}

/// RIFF/WAVE decoder backed by `hound`: integer PCM of 8 to 32 bits and
/// 32-bit float.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(DecodeError::Malformed { detail: "zero channels".to_string() });
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => {
                if spec.bits_per_sample != 32 {
                    return Err(DecodeError::UnsupportedFormat {
                        detail: format!("{}-bit float", spec.bits_per_sample),
                    });
                }
                reader.into_samples::<f32>().collect::<Result<_, _>>()?
            }
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << spec.bits_per_sample.clamp(1, 32).saturating_sub(1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
        };

        AudioBuffer::from_interleaved(spec.sample_rate, spec.channels as usize, &samples)
            .map_err(|e| DecodeError::Malformed { detail: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(wav: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([wav[offset], wav[offset + 1], wav[offset + 2], wav[offset + 3]])
    }

    fn u16_at(wav: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([wav[offset], wav[offset + 1]])
    }

    #[test]
    fn one_second_of_mono_silence() {
        let wav = encode_wav(&AudioBuffer::silent(44100, 1, 44100));
        assert_eq!(wav.len(), 44 + 88200);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 44136, "ChunkSize");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1);
        assert_eq!(u16_at(&wav, 22), 1);
        assert_eq!(u32_at(&wav, 24), 44100);
        assert_eq!(u32_at(&wav, 28), 88200, "ByteRate");
        assert_eq!(u16_at(&wav, 32), 2, "BlockAlign");
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 88200);
        assert!(wav[44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn asymmetric_sample_scaling() {
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32768);
        assert_eq!(sample_to_i16(0.5), 16384); // round(16383.5)
        assert_eq!(sample_to_i16(-0.5), -16384);
        assert_eq!(sample_to_i16(2.0), 32767);
        assert_eq!(sample_to_i16(-3.0), -32768);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn stereo_is_interleaved() {
        let buf = AudioBuffer::new(8000, vec![vec![1.0, 0.0], vec![-1.0, 0.5]]).unwrap();
        let wav = encode_wav(&buf);
        let body: Vec<i16> = wav[44..].chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(body, vec![32767, -32768, 0, 16384]);
        assert_eq!(u16_at(&wav, 32), 4);
    }

    #[test]
    fn decodes_what_hound_writes() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..100i16 {
                writer.write_sample(i * 100).unwrap();
                writer.write_sample(-i * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        let buf = WavDecoder.decode(cursor.get_ref()).unwrap();
        assert_eq!(buf.sample_rate(), 22050);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.frames(), 100);
        assert!((buf.channel(0)[10] - 1000.0 / 32768.0).abs() < 1e-6);
        assert!((buf.channel(1)[10] + 1000.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn decodes_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.25_f32, -0.75, 0.5] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        let buf = WavDecoder.decode(cursor.get_ref()).unwrap();
        assert_eq!(buf.channel(0), &[0.25, -0.75, 0.5]);
    }

    #[test]
    fn encoder_output_decodes() {
        let buf = AudioBuffer::new(16000, vec![vec![0.0, 0.5, -0.5, 1.0]]).unwrap();
        let decoded = WavDecoder.decode(&encode_wav(&buf)).unwrap();
        assert_eq!(decoded.frames(), 4);
        assert_eq!(decoded.sample_rate(), 16000);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(WavDecoder.decode(&[]).unwrap_err(), DecodeError::Empty);
        let err = WavDecoder.decode(b"ID3\x03not a wav at all").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat { .. } | DecodeError::Malformed { .. }));
    }
}
