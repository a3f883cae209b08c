//! Reverb effect — convolution with a procedurally generated impulse.
//!
//! The impulse is stereo white noise under a power-law decay envelope,
//! regenerated for every render. The wet path is scaled the way a browser
//! ConvolverNode normalizes its buffer, so the reverb level does not depend
//! on the impulse length.

use rand::Rng;
use rustfft::{FftPlanner, num_complex::Complex};

// Browser convolver calibration constants
const GAIN_CALIBRATION: f64 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// A stereo impulse response.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    sample_rate: u32,
    channels: [Vec<f32>; 2],
}

/// Impulse length in frames: `sample_rate * 2 * (0.5 + decay / 50)`.
pub fn impulse_length(sample_rate: u32, decay: f64) -> usize {
    (sample_rate as f64 * 2.0 * (0.5 + decay / 50.0)).floor().max(0.0) as usize
}

/// Build the impulse for `amount` and `decay` (both 0..=100).
///
/// `sample[i] = uniform(-1, 1) * (1 - i/len)^(1 + decay/100) * amount/100`
pub fn synthesize_impulse<R: Rng + ?Sized>(sample_rate: u32, amount: f64, decay: f64, rng: &mut R) -> ImpulseResponse {
    let length = impulse_length(sample_rate, decay);
    let exponent = 1.0 + decay / 100.0;
    let scale = amount / 100.0;

    let mut make_channel = || -> Vec<f32> {
        (0..length)
            .map(|i| {
                let envelope = (1.0 - i as f64 / length as f64).powf(exponent);
                let noise: f64 = rng.gen_range(-1.0..1.0);
                (noise * envelope * scale) as f32
            })
            .collect()
    };
    let left = make_channel();
    let right = make_channel();

    ImpulseResponse { sample_rate, channels: [left, right] }
}

impl ImpulseResponse {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index % 2]
    }

    /// Scale applied to the convolved signal: inverse RMS of the impulse,
    /// times the calibration gain, compensated for sample rate.
    pub fn normalization_scale(&self) -> f64 {
        let total: f64 = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        let count = (self.channels.len() * self.len()) as f64;
        let mut power = if count > 0.0 { (total / count).sqrt() } else { 0.0 };
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }
        let mut scale = GAIN_CALIBRATION / power;
        if self.sample_rate > 0 {
            scale *= GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate as f64;
        }
        scale
    }
}

/// Dry/wet convolution reverb over planar channels.
#[derive(Debug, Clone)]
pub struct ConvolutionReverb {
    impulse: ImpulseResponse,
    /// Dry level (0.0 to 1.0).
    pub dry: f32,
    /// Wet level (0.0 to 1.0).
    pub wet: f32,
}

impl ConvolutionReverb {
    pub fn new(impulse: ImpulseResponse, dry: f32, wet: f32) -> Self {
        Self { impulse, dry: dry.clamp(0.0, 1.0), wet: wet.clamp(0.0, 1.0) }
    }

    pub fn impulse(&self) -> &ImpulseResponse {
        &self.impulse
    }

    /// Mix each channel with its convolution against the impulse channel of
    /// the same side (mono input uses the left impulse). The tail past the
    /// input length is dropped, so frame count is unchanged.
    pub fn process_channels(&self, channels: &mut [Vec<f32>]) {
        let scale = self.impulse.normalization_scale();
        let mut planner = FftPlanner::<f64>::new();
        let sides = channels.len().min(2);
        let spectra: Vec<KernelSpectrum> =
            (0..sides).map(|side| KernelSpectrum::new(&mut planner, self.impulse.channel(side))).collect();
        for (index, ch) in channels.iter_mut().enumerate() {
            let wet = spectra[index % 2].convolve(&mut planner, ch);
            for (s, w) in ch.iter_mut().zip(wet) {
                *s = self.dry * *s + self.wet * (w * scale) as f32;
            }
        }
    }
}

/// Smallest overlap-add block, in frames.
const MIN_BLOCK: usize = 256;

/// Frequency-domain kernel for overlap-add convolution. The signal is cut
/// into blocks of `block` frames so the working buffers stay proportional
/// to the kernel, not to the signal.
pub struct KernelSpectrum {
    block: usize,
    size: usize,
    spectrum: Vec<Complex<f64>>,
}

impl KernelSpectrum {
    pub fn new(planner: &mut FftPlanner<f64>, kernel: &[f32]) -> Self {
        if kernel.is_empty() {
            return KernelSpectrum { block: 0, size: 0, spectrum: Vec::new() };
        }
        let block = kernel.len().next_power_of_two().max(MIN_BLOCK);
        let size = (block + kernel.len() - 1).next_power_of_two();
        let mut spectrum: Vec<Complex<f64>> = Vec::with_capacity(size);
        spectrum.extend(kernel.iter().map(|&x| Complex::new(x as f64, 0.0)));
        spectrum.resize(size, Complex::new(0.0, 0.0));
        planner.plan_fft_forward(size).process(&mut spectrum);
        KernelSpectrum { block, size, spectrum }
    }

    /// Linear convolution of `signal` with the kernel, truncated to `signal.len()`.
    pub fn convolve(&self, planner: &mut FftPlanner<f64>, signal: &[f32]) -> Vec<f64> {
        let n = signal.len();
        let mut out = vec![0.0; n];
        if n == 0 || self.size == 0 {
            return out;
        }
        let fft = planner.plan_fft_forward(self.size);
        let ifft = planner.plan_fft_inverse(self.size);
        // rustfft doesn't normalize, so divide by size
        let norm = 1.0 / self.size as f64;

        let mut buf = vec![Complex::new(0.0, 0.0); self.size];
        for (index, chunk) in signal.chunks(self.block).enumerate() {
            let start = index * self.block;
            for (slot, &x) in buf.iter_mut().zip(chunk) {
                *slot = Complex::new(x as f64, 0.0);
            }
            buf[chunk.len()..].fill(Complex::new(0.0, 0.0));

            fft.process(&mut buf);
            for (x, y) in buf.iter_mut().zip(&self.spectrum) {
                *x *= *y;
            }
            ifft.process(&mut buf);

            for (o, c) in out[start..].iter_mut().zip(&buf) {
                *o += c.re * norm;
            }
        }
        out
    }
}

/// Linear convolution of `signal` with `kernel`, truncated to `signal.len()`.
pub fn fft_convolve(planner: &mut FftPlanner<f64>, signal: &[f32], kernel: &[f32]) -> Vec<f64> {
    KernelSpectrum::new(planner, kernel).convolve(planner, signal)
}
