//! Decoded audio held as planar `f32` channels.

use crate::error::RenderError;

/// Immutable decoded audio: one `Vec<f32>` per channel, all the same length.
///
/// A loaded source is shared behind an `Arc` and never mutated; every
/// render produces a new buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer, checking that it is well formed.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, RenderError> {
        let buffer = AudioBuffer { sample_rate, channels };
        buffer.validate()?;
        Ok(buffer)
    }

    /// `frames` of silence on `channel_count` channels.
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        AudioBuffer { sample_rate, channels: vec![vec![0.0; frames]; channel_count] }
    }

    /// Split interleaved samples into planar channels. Trailing samples that
    /// do not fill a whole frame are dropped.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Result<Self, RenderError> {
        if channel_count == 0 {
            return Err(RenderError::InvalidBuffer { reason: "zero channels".to_string() });
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.sample_rate == 0 {
            return Err(RenderError::InvalidBuffer { reason: "sample rate is zero".to_string() });
        }
        let Some(first) = self.channels.first() else {
            return Err(RenderError::InvalidBuffer { reason: "zero channels".to_string() });
        };
        if self.channels.iter().any(|c| c.len() != first.len()) {
            return Err(RenderError::InvalidBuffer { reason: "channels differ in length".to_string() });
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Interleaved copy (frame-major), as written into a WAV data chunk.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Copy out `[start_secs, end_secs)` by sample-index slicing:
    /// `floor(t * sample_rate)` for both bounds.
    pub fn crop(&self, start_secs: f64, end_secs: f64) -> Result<AudioBuffer, RenderError> {
        let duration = self.duration();
        let invalid = RenderError::InvalidSegment { start: start_secs, end: end_secs, duration };
        if !start_secs.is_finite() || !end_secs.is_finite() || start_secs < 0.0 || end_secs <= start_secs {
            return Err(invalid);
        }
        let sr = self.sample_rate as f64;
        let start = (start_secs * sr).floor() as usize;
        let end = (end_secs * sr).floor() as usize;
        if end > self.frames() || end <= start {
            return Err(invalid);
        }
        let channels = self.channels.iter().map(|c| c[start..end].to_vec()).collect();
        Ok(AudioBuffer { sample_rate: self.sample_rate, channels })
    }

    /// Largest absolute sample across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0_f32, |m, &s| m.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(sample_rate: u32, secs: f64) -> AudioBuffer {
        let frames = (sample_rate as f64 * secs) as usize;
        let data: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        AudioBuffer::new(sample_rate, vec![data.clone(), data]).unwrap()
    }

    #[test]
    fn crop_two_seconds_of_ten() {
        let buf = ramp(8000, 10.0);
        let cropped = buf.crop(0.0, 2.0).unwrap();
        assert_eq!(cropped.frames(), 2 * 8000);
        assert_eq!(cropped.channel_count(), 2);
        assert_eq!(cropped.channel(0)[0], buf.channel(0)[0]);
    }

    #[test]
    fn crop_uses_floor_of_sample_index() {
        let buf = ramp(1000, 1.0);
        let cropped = buf.crop(0.1234, 0.5678).unwrap();
        assert_eq!(cropped.frames(), 567 - 123);
        assert_eq!(cropped.channel(1)[0], buf.channel(1)[123]);
    }

    #[test]
    fn crop_rejects_out_of_range() {
        let buf = ramp(1000, 1.0);
        assert!(buf.crop(0.5, 1.5).is_err());
        assert!(buf.crop(-0.1, 0.5).is_err());
        assert!(buf.crop(0.5, 0.5).is_err());
        assert!(buf.crop(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn mismatched_channels_are_rejected() {
        let err = AudioBuffer::new(44100, vec![vec![0.0; 10], vec![0.0; 9]]).unwrap_err();
        assert_eq!(err.code(), "render.invalid_buffer");
        assert!(AudioBuffer::new(44100, vec![]).is_err());
        assert!(AudioBuffer::new(0, vec![vec![0.0]]).is_err());
    }

    #[test]
    fn interleave_round_trip() {
        let samples = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buf = AudioBuffer::from_interleaved(48000, 2, &samples).unwrap();
        assert_eq!(buf.frames(), 3);
        assert_eq!(buf.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buf.interleaved(), samples.to_vec());
    }
}
