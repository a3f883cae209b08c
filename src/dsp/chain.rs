//! Signal chain — the ordered list of stages a render runs.
//!
//! A chain is built fresh for every render from a parameter snapshot and
//! dropped when the render finishes; nothing is shared between renders.
//! Order is fixed: filters, then the compressor, then the output gain,
//! then stereo width and reverb. The compressor reacts to the level the
//! equalizer leaves behind, so moving it changes the result.

use rand::Rng;

use crate::buffer::AudioBuffer;
use crate::config::ChainProfile;
use crate::error::RenderError;
use crate::params::ProcessingParams;

use super::compressor::Compressor;
use super::filter::{BiquadFilter, FilterType};
use super::reverb::{ConvolutionReverb, synthesize_impulse};

// Fixed chain constants
const DENOISE_MAX_CUTOFF: f64 = 8000.0;
const DENOISE_MIN_CUTOFF: f64 = 1000.0;
const DENOISE_HZ_PER_STEP: f64 = 70.0;
const LOWPASS_Q_DB: f64 = 1.0;
const LOW_EQ_HZ: f64 = 150.0;
const MID_EQ_HZ: f64 = 1000.0;
const HIGH_EQ_HZ: f64 = 8000.0;
const EQ_Q: f64 = 1.0;
const CLARITY_HZ: f64 = 6000.0;
const CLARITY_DB_PER_STEP: f64 = 0.2;
const COMP_THRESHOLD_DB: f64 = -24.0;
const COMP_KNEE_DB: f64 = 30.0;
const COMP_ATTACK_S: f64 = 0.003;
const COMP_RELEASE_S: f64 = 0.25;
const NEUTRAL: f64 = 50.0;

/// What a filter stage is for; used in logs and stage listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    Denoise,
    LowEq,
    MidEq,
    HighEq,
    Clarity,
    LowClarity,
    VoiceClarity,
    HighSmooth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub role: FilterRole,
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,
    pub gain_db: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSpec {
    pub threshold: f64,
    pub knee: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
}

/// One processing step. Each stage maps a buffer to a buffer with the same
/// frame count and channel count.
#[derive(Debug, Clone)]
pub enum Stage {
    Filter(FilterSpec),
    Compressor(CompressorSpec),
    Gain(f32),
    StereoWidth(f32),
    Reverb(ConvolutionReverb),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Filter(spec) => match spec.role {
                FilterRole::Denoise => "denoise",
                FilterRole::LowEq => "low-eq",
                FilterRole::MidEq => "mid-eq",
                FilterRole::HighEq => "high-eq",
                FilterRole::Clarity => "clarity",
                FilterRole::LowClarity => "low-clarity",
                FilterRole::VoiceClarity => "voice-clarity",
                FilterRole::HighSmooth => "high-smooth",
            },
            Stage::Compressor(_) => "compressor",
            Stage::Gain(_) => "gain",
            Stage::StereoWidth(_) => "stereo-width",
            Stage::Reverb(_) => "reverb",
        }
    }

    /// Run the stage over `input`, consuming it.
    pub fn process(&self, input: AudioBuffer) -> Result<AudioBuffer, RenderError> {
        let sample_rate = input.sample_rate();
        let mut channels = input.into_channels();
        match self {
            Stage::Filter(spec) => {
                for ch in channels.iter_mut() {
                    // Fresh state per channel
                    let mut filter =
                        BiquadFilter::with_params(spec.filter_type, sample_rate as f64, spec.frequency, spec.q, spec.gain_db);
                    filter.process_block(ch);
                }
            }
            Stage::Compressor(spec) => {
                let mut comp = Compressor::with_params(
                    sample_rate as f64,
                    spec.threshold,
                    spec.knee,
                    spec.ratio,
                    spec.attack,
                    spec.release,
                );
                comp.process_channels(&mut channels);
            }
            Stage::Gain(gain) | Stage::StereoWidth(gain) => {
                for s in channels.iter_mut().flat_map(|c| c.iter_mut()) {
                    *s *= *gain;
                }
            }
            Stage::Reverb(reverb) => reverb.process_channels(&mut channels),
        }
        AudioBuffer::new(sample_rate, channels)
    }
}

/// Owned per-render processing graph.
#[derive(Debug, Clone)]
pub struct RenderContext {
    sample_rate: u32,
    stages: Vec<Stage>,
}

impl RenderContext {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Push `input` through every stage in order.
    pub fn run(self, input: AudioBuffer) -> Result<AudioBuffer, RenderError> {
        if input.sample_rate() != self.sample_rate {
            return Err(RenderError::InvalidBuffer {
                reason: format!(
                    "chain built for {} Hz, buffer is {} Hz",
                    self.sample_rate,
                    input.sample_rate()
                ),
            });
        }
        let frames = input.frames();
        let channel_count = input.channel_count();
        let mut buffer = input;
        for stage in &self.stages {
            buffer = stage.process(buffer)?;
        }
        debug_assert_eq!(buffer.frames(), frames);
        debug_assert_eq!(buffer.channel_count(), channel_count);
        Ok(buffer)
    }
}

/// Lowpass cutoff for the de-noise stage.
pub fn denoise_cutoff(noise_reduction: f64) -> f64 {
    (DENOISE_MAX_CUTOFF - noise_reduction * DENOISE_HZ_PER_STEP).max(DENOISE_MIN_CUTOFF)
}

/// Compressor ratio driven by the bass-boost slider: 1 at 0, 13 at 100.
pub fn compressor_ratio(bass_boost: f64) -> f64 {
    1.0 + (bass_boost / 100.0) * 12.0
}

fn filter(role: FilterRole, filter_type: FilterType, frequency: f64, q: f64, gain_db: f64) -> Stage {
    Stage::Filter(FilterSpec { role, filter_type, frequency, q, gain_db })
}

/// Auxiliary filters of the professional profile, each neutral at 50.
fn professional_filters(p: &ProcessingParams) -> [Stage; 3] {
    let low = p.low_freq_clear - NEUTRAL;
    let voice = p.voice_mid_freq - NEUTRAL;
    [
        filter(FilterRole::LowClarity, FilterType::Peaking, 150.0 + low * 3.0, 1.0 + low * 0.02, low * 0.1),
        filter(FilterRole::VoiceClarity, FilterType::Peaking, 3000.0 + voice * 20.0, 1.5 + voice * 0.01, voice * 0.12),
        filter(
            FilterRole::HighSmooth,
            FilterType::HighShelf,
            10000.0 + (100.0 - p.high_freq_smooth) * 40.0,
            1.0,
            (NEUTRAL - p.high_freq_smooth) * 0.1,
        ),
    ]
}

/// Build the chain for `params` at `sample_rate`.
///
/// `rng` is only drawn from when reverb is enabled.
pub fn build_chain<R: Rng + ?Sized>(
    params: &ProcessingParams,
    sample_rate: u32,
    profile: ChainProfile,
    rng: &mut R,
) -> RenderContext {
    let p = params.sanitized();
    let mut stages = vec![
        filter(FilterRole::Denoise, FilterType::Lowpass, denoise_cutoff(p.noise_reduction), LOWPASS_Q_DB, 0.0),
        filter(FilterRole::LowEq, FilterType::Peaking, LOW_EQ_HZ, EQ_Q, p.low_freq),
        filter(FilterRole::MidEq, FilterType::Peaking, MID_EQ_HZ, EQ_Q, p.mid_freq),
        filter(FilterRole::HighEq, FilterType::Peaking, HIGH_EQ_HZ, EQ_Q, p.high_freq),
        filter(FilterRole::Clarity, FilterType::HighShelf, CLARITY_HZ, 1.0, p.clarity * CLARITY_DB_PER_STEP),
    ];

    if profile == ChainProfile::Professional {
        stages.extend(professional_filters(&p));
    }

    stages.push(Stage::Compressor(CompressorSpec {
        threshold: COMP_THRESHOLD_DB,
        knee: COMP_KNEE_DB,
        ratio: compressor_ratio(p.bass_boost),
        attack: COMP_ATTACK_S,
        release: COMP_RELEASE_S,
    }));
    stages.push(Stage::Gain((p.volume_gain / NEUTRAL) as f32));

    if p.stereo_width != NEUTRAL {
        stages.push(Stage::StereoWidth((p.stereo_width / NEUTRAL) as f32));
    }

    if p.reverb > 0.0 {
        let impulse = synthesize_impulse(sample_rate, p.reverb, p.decay_time, rng);
        let wet = p.reverb / 100.0;
        stages.push(Stage::Reverb(ConvolutionReverb::new(impulse, (1.0 - wet) as f32, wet as f32)));
    }

    RenderContext { sample_rate, stages }
}
