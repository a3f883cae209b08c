//! Biquad filter — matches WebAudio BiquadFilterNode coefficients.

use std::f64::consts::PI;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    /// Q is interpreted in dB, as BiquadFilterNode does for lowpass.
    Lowpass,
    Peaking,
    HighShelf,
}

/// A biquad IIR filter (2nd order).
///
/// Implements the standard Direct Form II Transposed structure.
/// Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson),
/// with the browser's handling of degenerate settings: a frequency at or
/// past Nyquist, a frequency of zero, or a non-positive Q collapse to the
/// limiting constant-gain filter instead of producing NaN.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    frequency: f64,
    q: f64,
    gain_db: f64, // Peaking and HighShelf only

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl BiquadFilter {
    /// Build a filter with its coefficients computed for `sample_rate`.
    pub fn with_params(filter_type: FilterType, sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency,
            q,
            gain_db,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.update_coefficients();
        f
    }

    /// Recompute filter coefficients from current parameters.
    fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let normalized = if self.frequency.is_finite() && nyquist > 0.0 {
            (self.frequency / nyquist).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let gain_db = if self.gain_db.is_finite() { self.gain_db } else { 0.0 };
        let a_lin = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass => {
                if normalized >= 1.0 {
                    (1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
                } else if normalized > 0.0 {
                    let resonance = 10.0_f64.powf(self.q / 20.0);
                    let w0 = PI * normalized;
                    let alpha = w0.sin() / (2.0 * resonance);
                    let cos_w0 = w0.cos();
                    let beta = (1.0 - cos_w0) / 2.0;
                    (beta, 2.0 * beta, beta, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
                } else {
                    (0.0, 0.0, 0.0, 1.0, 0.0, 0.0)
                }
            }
            FilterType::Peaking => {
                if normalized > 0.0 && normalized < 1.0 {
                    if self.q > 0.0 {
                        let w0 = PI * normalized;
                        let alpha = w0.sin() / (2.0 * self.q);
                        let cos_w0 = w0.cos();
                        let b0 = 1.0 + alpha * a_lin;
                        let b1 = -2.0 * cos_w0;
                        let b2 = 1.0 - alpha * a_lin;
                        let a0 = 1.0 + alpha / a_lin;
                        let a1 = -2.0 * cos_w0;
                        let a2 = 1.0 - alpha / a_lin;
                        (b0, b1, b2, a0, a1, a2)
                    } else {
                        // Limit as Q -> 0 is a flat A^2 gain.
                        (a_lin * a_lin, 0.0, 0.0, 1.0, 0.0, 0.0)
                    }
                } else {
                    (1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
                }
            }
            FilterType::HighShelf => {
                if normalized >= 1.0 {
                    (1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
                } else if normalized > 0.0 {
                    let w0 = PI * normalized;
                    // Shelf slope S = 1.
                    let alpha = 0.5 * w0.sin() * 2.0_f64.sqrt();
                    let k = w0.cos();
                    let k2 = 2.0 * a_lin.sqrt() * alpha;
                    let a_plus = a_lin + 1.0;
                    let a_minus = a_lin - 1.0;
                    let b0 = a_lin * (a_plus + a_minus * k + k2);
                    let b1 = -2.0 * a_lin * (a_minus + a_plus * k);
                    let b2 = a_lin * (a_plus + a_minus * k - k2);
                    let a0 = a_plus - a_minus * k + k2;
                    let a1 = 2.0 * (a_minus - a_plus * k);
                    let a2 = a_plus - a_minus * k - k2;
                    (b0, b1, b2, a0, a1, a2)
                } else {
                    (a_lin * a_lin, 0.0, 0.0, 1.0, 0.0, 0.0)
                }
            }
        };

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    /// Process a single sample through the filter.
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Filter a channel in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s as f64) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Magnitude response in dB at `freq` Hz.
    fn magnitude_db(f: &BiquadFilter, freq: f64) -> f64 {
        let w = 2.0 * PI * freq / f.sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = f.b0 + f.b1 * c1 + f.b2 * c2;
        let num_im = -(f.b1 * s1 + f.b2 * s2);
        let den_re = 1.0 + f.a1 * c1 + f.a2 * c2;
        let den_im = -(f.a1 * s1 + f.a2 * s2);
        let mag = ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt();
        20.0 * mag.log10()
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 44100.0, 5000.0, 1.0, 0.0);

        // Feed DC signal (1.0), should converge to 1.0
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!(
            (output - 1.0).abs() < 0.001,
            "Lowpass should pass DC, got {output}"
        );
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 44100.0, 200.0, 0.0, 0.0);

        // Generate a 10kHz sine and measure output amplitude
        let freq = 10000.0;
        let mut max_out = 0.0_f64;
        for i in 0..4410 {
            let t = i as f64 / 44100.0;
            let input = (2.0 * PI * freq * t).sin();
            let out = f.process(input);
            if i > 1000 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        assert!(
            max_out < 0.01,
            "Lowpass@200Hz should strongly attenuate 10kHz, got amplitude {max_out}"
        );
    }

    #[test]
    fn lowpass_above_nyquist_is_passthrough() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 8000.0, 8000.0, 1.0, 0.0);
        for x in [0.3, -0.7, 0.1] {
            assert_eq!(f.process(x), x);
        }
    }

    #[test]
    fn peaking_gain_at_center() {
        let f = BiquadFilter::with_params(FilterType::Peaking, 44100.0, 1000.0, 1.0, 6.0);
        let at_center = magnitude_db(&f, 1000.0);
        assert!((at_center - 6.0).abs() < 0.01, "expected +6 dB at center, got {at_center}");
        let far = magnitude_db(&f, 15000.0);
        assert!(far.abs() < 0.5, "peaking should be near flat far from center, got {far}");
    }

    #[test]
    fn peaking_zero_gain_is_flat() {
        let mut f = BiquadFilter::with_params(FilterType::Peaking, 48000.0, 150.0, 1.0, 0.0);
        for x in [0.5, -0.25, 0.75, 0.0] {
            assert!((f.process(x) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn peaking_zero_q_is_constant_gain() {
        let mut f = BiquadFilter::with_params(FilterType::Peaking, 44100.0, 100.0, 0.0, 6.0);
        let expected = 10.0_f64.powf(6.0 / 20.0);
        let out = f.process(1.0);
        assert!((out - expected).abs() < 1e-9, "got {out}");
    }

    #[test]
    fn high_shelf_boosts_highs_not_lows() {
        let f = BiquadFilter::with_params(FilterType::HighShelf, 44100.0, 6000.0, 1.0, 12.0);
        let low = magnitude_db(&f, 100.0);
        let high = magnitude_db(&f, 18000.0);
        assert!(low.abs() < 0.5, "shelf should leave lows alone, got {low}");
        assert!((high - 12.0).abs() < 1.0, "shelf should lift highs by ~12 dB, got {high}");
    }

    #[test]
    fn filter_output_finite() {
        let mut f = BiquadFilter::with_params(FilterType::HighShelf, 22050.0, 14000.0, 1.0, -5.0);

        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            let out = f.process(input);
            assert!(out.is_finite(), "Filter output not finite at sample {i}");
        }
    }
}
