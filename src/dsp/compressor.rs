//! Compressor effect — dynamics processing for audio leveling.
//!
//! Implements a feed-forward compressor with threshold, ratio, knee,
//! attack, and release parameters matching the WebAudio DynamicsCompressorNode
//! ranges. Detection is linked across channels so the stereo image does not
//! shift under gain reduction. Like the browser node, the output is lifted
//! by an automatic makeup gain derived from the curve at full scale.

/// A channel-linked dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f64,

    /// Threshold in dB (-100 to 0).
    threshold: f64,
    /// Compression ratio (1 to 20; 1 disables compression).
    ratio: f64,
    /// Knee width in dB (0 = hard knee, up to 40).
    knee: f64,
    /// Attack time in seconds.
    attack: f64,
    /// Release time in seconds.
    release: f64,
    /// Automatic makeup gain in dB.
    makeup_gain: f64,

    // Internal state
    envelope: f64, // Current envelope level (linear)
}

impl Compressor {
    /// Create a compressor with specific parameters.
    pub fn with_params(
        sample_rate: f64,
        threshold: f64,
        knee: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    ) -> Self {
        let mut c = Self {
            sample_rate,
            threshold: threshold.clamp(-100.0, 0.0),
            ratio: ratio.clamp(1.0, 20.0),
            knee: knee.clamp(0.0, 40.0),
            attack: attack.clamp(0.0001, 1.0),
            release: release.clamp(0.001, 5.0),
            makeup_gain: 0.0,
            envelope: 0.0,
        };
        c.makeup_gain = c.auto_makeup_db();
        c
    }

    /// Makeup gain in dB: the reduction a full-scale signal receives,
    /// raised to the 0.6 power in the linear domain.
    fn auto_makeup_db(&self) -> f64 {
        -0.6 * self.compute_gain(0.0)
    }

    pub fn makeup_gain(&self) -> f64 {
        self.makeup_gain
    }

    /// Convert linear amplitude to dB.
    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    /// Convert dB to linear amplitude.
    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Gain change in dB (always <= 0) for a given detector level.
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        let threshold = self.threshold;
        let slope = 1.0 / self.ratio - 1.0;
        let knee = self.knee;
        let over = input_db - threshold;

        if knee > 0.0 && 2.0 * over.abs() <= knee {
            // In the knee region - quadratic interpolation
            let x = over + knee / 2.0;
            slope * x * x / (2.0 * knee)
        } else if 2.0 * over > knee {
            slope * over
        } else {
            0.0 // Below knee, no compression
        }
    }

    /// Process one frame (one sample per channel) in place.
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        let input_level = frame.iter().fold(0.0_f32, |m, s| m.max(s.abs())) as f64;

        // Envelope follower (peak detection with attack/release)
        let attack_coef = (-1.0 / (self.attack * self.sample_rate)).exp();
        let release_coef = (-1.0 / (self.release * self.sample_rate)).exp();

        if input_level > self.envelope {
            self.envelope = attack_coef * self.envelope + (1.0 - attack_coef) * input_level;
        } else {
            self.envelope = release_coef * self.envelope + (1.0 - release_coef) * input_level;
        }

        let envelope_db = Self::linear_to_db(self.envelope);
        let gain_reduction_db = self.compute_gain(envelope_db);

        let total_gain_db = gain_reduction_db + self.makeup_gain;
        let gain = Self::db_to_linear(total_gain_db) as f32;

        for s in frame.iter_mut() {
            *s *= gain;
        }
    }

    /// Process planar channels of equal length in place.
    pub fn process_channels(&mut self, channels: &mut [Vec<f32>]) {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut frame = vec![0.0_f32; channels.len()];
        for i in 0..frames {
            for (slot, ch) in frame.iter_mut().zip(channels.iter()) {
                *slot = ch[i];
            }
            self.process_frame(&mut frame);
            for (ch, &s) in channels.iter_mut().zip(frame.iter()) {
                ch[i] = s;
            }
        }
    }
}
