//! Preset table — named, hand-tuned parameter templates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::params::{BitRate, OutputFormat, ProcessingParams, SampleRateLabel};

/// A named preset. Applying one replaces the whole parameter set, except
/// `Custom`, which means "leave the current parameters alone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Standard,
    Recommended,
    Highest,
    Custom,
}

// ── Literal tables ──────────────────────────────────────────

const STANDARD: ProcessingParams = ProcessingParams {
    output_format: OutputFormat::Opus,
    sample_rate: SampleRateLabel::Khz44_1,
    bit_rate: BitRate::from_const(128),
    clarity: 60.0,
    volume_gain: 55.0,
    reverb: 0.0,
    decay_time: 20.0,
    stereo_width: 30.0,
    noise_reduction: 40.0,
    low_freq: -8.0,
    mid_freq: 2.0,
    high_freq: 4.0,
    bass_boost: 15.0,
    voice_mid_freq: 50.0,
    high_freq_smooth: 50.0,
    low_freq_clear: 50.0,
};

const RECOMMENDED: ProcessingParams = ProcessingParams {
    output_format: OutputFormat::Opus,
    sample_rate: SampleRateLabel::Khz96,
    bit_rate: BitRate::from_const(160),
    clarity: 85.0,
    volume_gain: 95.0,
    reverb: 0.0,
    decay_time: 15.0,
    stereo_width: 25.0,
    noise_reduction: 20.0,
    low_freq: -10.0,
    mid_freq: 0.0,
    high_freq: 6.0,
    bass_boost: 25.0,
    voice_mid_freq: 60.0,
    high_freq_smooth: 45.0,
    low_freq_clear: 55.0,
};

const HIGHEST: ProcessingParams = ProcessingParams {
    output_format: OutputFormat::Wav,
    sample_rate: SampleRateLabel::Khz96,
    bit_rate: BitRate::from_const(32),
    clarity: 75.0,
    volume_gain: 85.0,
    reverb: 0.0,
    decay_time: 15.0,
    stereo_width: 45.0,
    noise_reduction: 40.0,
    low_freq: -5.0,
    mid_freq: 4.0,
    high_freq: 2.0,
    bass_boost: 30.0,
    voice_mid_freq: 75.0,
    high_freq_smooth: 70.0,
    low_freq_clear: 65.0,
};

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Standard, Preset::Recommended, Preset::Highest, Preset::Custom];

    /// The fixed template, or `None` for `Custom`.
    pub fn template(&self) -> Option<ProcessingParams> {
        match self {
            Preset::Standard => Some(STANDARD),
            Preset::Recommended => Some(RECOMMENDED),
            Preset::Highest => Some(HIGHEST),
            Preset::Custom => None,
        }
    }

    /// Parameters for this preset. `Custom` yields the neutral baseline,
    /// which is what a fresh custom form starts from.
    pub fn params(&self) -> ProcessingParams {
        self.template().unwrap_or(ProcessingParams::NEUTRAL)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Standard => "standard",
            Preset::Recommended => "recommended",
            Preset::Highest => "highest",
            Preset::Custom => "custom",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Preset::Standard => "Standard quality",
            Preset::Recommended => "Recommended quality",
            Preset::Highest => "Professional quality",
            Preset::Custom => "Custom",
        }
    }

    pub fn description(&self) -> &'static [&'static str] {
        match self {
            Preset::Standard => &["Basic noise reduction", "Tone enhancement", "Balanced processing"],
            Preset::Recommended => &["Smart de-noise", "Clarity boost", "Optimised output"],
            Preset::Highest => &["Deep processing", "Tone enhancement", "Lossless WAV"],
            Preset::Custom => &["Keep the current settings"],
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown preset '{s}' (expected standard, recommended, highest or custom)"))
    }
}
