//! Processing parameters — the tunable surface of the signal chain.
//!
//! Numeric fields are plain `f64` sliders with fixed ranges. Anything that
//! arrives from outside (patches, JSON, the CLI) passes through [`coerce`]
//! before it is stored, so the DSP never sees a non-finite or out-of-range
//! value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::preset::Preset;

/// Requested output container. Rendering always emits 16-bit PCM WAV; the
/// selection only travels as metadata and into filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Wav,
    Opus,
    Mp3,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "WAV",
            OutputFormat::Opus => "OPUS",
            OutputFormat::Mp3 => "MP3",
        }
    }
}

/// Sample-rate label shown to the user. Informational: it does not change
/// the rate a clip is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRateLabel {
    #[serde(rename = "22.05kHz")]
    Khz22_05,
    #[serde(rename = "44.1kHz")]
    Khz44_1,
    #[serde(rename = "48kHz")]
    Khz48,
    #[serde(rename = "96kHz")]
    Khz96,
}

impl SampleRateLabel {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRateLabel::Khz22_05 => 22_050,
            SampleRateLabel::Khz44_1 => 44_100,
            SampleRateLabel::Khz48 => 48_000,
            SampleRateLabel::Khz96 => 96_000,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SampleRateLabel::Khz22_05 => "22.05kHz",
            SampleRateLabel::Khz44_1 => "44.1kHz",
            SampleRateLabel::Khz48 => "48kHz",
            SampleRateLabel::Khz96 => "96kHz",
        }
    }
}

/// Bit-rate (lossy formats, kbps) or bit-depth (WAV) label.
///
/// Serialized as a string (`"160"`) to match the form values the UI sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitRate(u16);

impl BitRate {
    pub const ALLOWED: [u16; 10] = [16, 24, 32, 64, 96, 128, 160, 192, 256, 320];

    pub(crate) const fn from_const(value: u16) -> Self {
        BitRate(value)
    }

    pub fn new(value: u16) -> Option<Self> {
        Self::ALLOWED.contains(&value).then_some(BitRate(value))
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Quality tag used in export filenames: `"32bit"` for WAV, `"160kbps"` otherwise.
    pub fn quality_label(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Wav => format!("{}bit", self.0),
            OutputFormat::Opus | OutputFormat::Mp3 => format!("{}kbps", self.0),
        }
    }
}

impl TryFrom<String> for BitRate {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let value: u16 = s.trim().parse().map_err(|_| format!("invalid bit rate '{s}'"))?;
        BitRate::new(value).ok_or_else(|| format!("unsupported bit rate '{s}'"))
    }
}

impl From<BitRate> for String {
    fn from(b: BitRate) -> Self {
        b.0.to_string()
    }
}

impl fmt::Display for BitRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full parameter set: 13 sliders plus three output-format fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingParams {
    pub output_format: OutputFormat,
    pub sample_rate: SampleRateLabel,
    pub bit_rate: BitRate,
    pub clarity: f64,
    pub volume_gain: f64,
    pub reverb: f64,
    pub decay_time: f64,
    pub stereo_width: f64,
    pub noise_reduction: f64,
    pub low_freq: f64,
    pub mid_freq: f64,
    pub high_freq: f64,
    pub bass_boost: f64,
    pub voice_mid_freq: f64,
    pub high_freq_smooth: f64,
    pub low_freq_clear: f64,
}

/// A numeric slider of [`ProcessingParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamField {
    VolumeGain,
    Clarity,
    NoiseReduction,
    BassBoost,
    StereoWidth,
    Reverb,
    DecayTime,
    VoiceMidFreq,
    HighFreqSmooth,
    LowFreqClear,
    LowFreq,
    MidFreq,
    HighFreq,
}

impl ParamField {
    pub const ALL: [ParamField; 13] = [
        ParamField::VolumeGain,
        ParamField::Clarity,
        ParamField::NoiseReduction,
        ParamField::BassBoost,
        ParamField::StereoWidth,
        ParamField::Reverb,
        ParamField::DecayTime,
        ParamField::VoiceMidFreq,
        ParamField::HighFreqSmooth,
        ParamField::LowFreqClear,
        ParamField::LowFreq,
        ParamField::MidFreq,
        ParamField::HighFreq,
    ];

    /// camelCase name as used in JSON and on the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            ParamField::VolumeGain => "volumeGain",
            ParamField::Clarity => "clarity",
            ParamField::NoiseReduction => "noiseReduction",
            ParamField::BassBoost => "bassBoost",
            ParamField::StereoWidth => "stereoWidth",
            ParamField::Reverb => "reverb",
            ParamField::DecayTime => "decayTime",
            ParamField::VoiceMidFreq => "voiceMidFreq",
            ParamField::HighFreqSmooth => "highFreqSmooth",
            ParamField::LowFreqClear => "lowFreqClear",
            ParamField::LowFreq => "lowFreq",
            ParamField::MidFreq => "midFreq",
            ParamField::HighFreq => "highFreq",
        }
    }

    pub fn from_name(name: &str) -> Option<ParamField> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Inclusive valid range.
    pub fn range(&self) -> (f64, f64) {
        match self {
            ParamField::LowFreq | ParamField::MidFreq | ParamField::HighFreq => (-20.0, 20.0),
            _ => (0.0, 100.0),
        }
    }

    /// Value substituted for non-finite input: the neutral setting of the slider.
    pub fn fallback(&self) -> f64 {
        self.get(&ProcessingParams::NEUTRAL)
    }

    pub fn get(&self, p: &ProcessingParams) -> f64 {
        match self {
            ParamField::VolumeGain => p.volume_gain,
            ParamField::Clarity => p.clarity,
            ParamField::NoiseReduction => p.noise_reduction,
            ParamField::BassBoost => p.bass_boost,
            ParamField::StereoWidth => p.stereo_width,
            ParamField::Reverb => p.reverb,
            ParamField::DecayTime => p.decay_time,
            ParamField::VoiceMidFreq => p.voice_mid_freq,
            ParamField::HighFreqSmooth => p.high_freq_smooth,
            ParamField::LowFreqClear => p.low_freq_clear,
            ParamField::LowFreq => p.low_freq,
            ParamField::MidFreq => p.mid_freq,
            ParamField::HighFreq => p.high_freq,
        }
    }

    fn slot<'a>(&self, p: &'a mut ProcessingParams) -> &'a mut f64 {
        match self {
            ParamField::VolumeGain => &mut p.volume_gain,
            ParamField::Clarity => &mut p.clarity,
            ParamField::NoiseReduction => &mut p.noise_reduction,
            ParamField::BassBoost => &mut p.bass_boost,
            ParamField::StereoWidth => &mut p.stereo_width,
            ParamField::Reverb => &mut p.reverb,
            ParamField::DecayTime => &mut p.decay_time,
            ParamField::VoiceMidFreq => &mut p.voice_mid_freq,
            ParamField::HighFreqSmooth => &mut p.high_freq_smooth,
            ParamField::LowFreqClear => &mut p.low_freq_clear,
            ParamField::LowFreq => &mut p.low_freq,
            ParamField::MidFreq => &mut p.mid_freq,
            ParamField::HighFreq => &mut p.high_freq,
        }
    }

    /// Coerce and store `value` into `p`.
    pub fn set(&self, p: &mut ProcessingParams, value: f64) {
        *self.slot(p) = coerce(*self, value);
    }
}

/// Map any input to a usable slider value: non-finite becomes the field's
/// neutral default, finite values are clamped into range.
pub fn coerce(field: ParamField, value: f64) -> f64 {
    if !value.is_finite() {
        return field.fallback();
    }
    let (lo, hi) = field.range();
    value.clamp(lo, hi)
}

impl ProcessingParams {
    /// Neutral baseline: unity gain, flat EQ, no compression, no reverb.
    pub const NEUTRAL: ProcessingParams = ProcessingParams {
        output_format: OutputFormat::Wav,
        sample_rate: SampleRateLabel::Khz44_1,
        bit_rate: BitRate::from_const(160),
        clarity: 0.0,
        volume_gain: 50.0,
        reverb: 0.0,
        decay_time: 50.0,
        stereo_width: 50.0,
        noise_reduction: 0.0,
        low_freq: 0.0,
        mid_freq: 0.0,
        high_freq: 0.0,
        bass_boost: 0.0,
        voice_mid_freq: 50.0,
        high_freq_smooth: 50.0,
        low_freq_clear: 50.0,
    };

    /// Copy with every numeric field coerced into its valid range.
    pub fn sanitized(mut self) -> Self {
        for field in ParamField::ALL {
            let v = field.get(&self);
            field.set(&mut self, v);
        }
        self
    }

    /// Field-wise merge of `patch`; untouched fields are kept as they are.
    pub fn merged(mut self, patch: &ParamsPatch) -> Self {
        if let Some(f) = patch.output_format {
            self.output_format = f;
        }
        if let Some(r) = patch.sample_rate {
            self.sample_rate = r;
        }
        if let Some(b) = patch.bit_rate {
            self.bit_rate = b;
        }
        for (field, value) in patch.numeric_entries() {
            field.set(&mut self, value);
        }
        self
    }
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Preset::Recommended.params()
    }
}

/// Partial update. Absent fields are left untouched by [`ParamStore::update`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<SampleRateLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<BitRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stereo_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_reduction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bass_boost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_mid_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_freq_smooth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_freq_clear: Option<f64>,
}

impl ParamsPatch {
    /// Patch touching a single numeric field.
    pub fn single(field: ParamField, value: f64) -> Self {
        let mut patch = ParamsPatch::default();
        patch.set(field, value);
        patch
    }

    pub fn set(&mut self, field: ParamField, value: f64) {
        let slot = match field {
            ParamField::VolumeGain => &mut self.volume_gain,
            ParamField::Clarity => &mut self.clarity,
            ParamField::NoiseReduction => &mut self.noise_reduction,
            ParamField::BassBoost => &mut self.bass_boost,
            ParamField::StereoWidth => &mut self.stereo_width,
            ParamField::Reverb => &mut self.reverb,
            ParamField::DecayTime => &mut self.decay_time,
            ParamField::VoiceMidFreq => &mut self.voice_mid_freq,
            ParamField::HighFreqSmooth => &mut self.high_freq_smooth,
            ParamField::LowFreqClear => &mut self.low_freq_clear,
            ParamField::LowFreq => &mut self.low_freq,
            ParamField::MidFreq => &mut self.mid_freq,
            ParamField::HighFreq => &mut self.high_freq,
        };
        *slot = Some(value);
    }

    fn numeric_entries(&self) -> Vec<(ParamField, f64)> {
        [
            (ParamField::Clarity, self.clarity),
            (ParamField::VolumeGain, self.volume_gain),
            (ParamField::Reverb, self.reverb),
            (ParamField::DecayTime, self.decay_time),
            (ParamField::StereoWidth, self.stereo_width),
            (ParamField::NoiseReduction, self.noise_reduction),
            (ParamField::LowFreq, self.low_freq),
            (ParamField::MidFreq, self.mid_freq),
            (ParamField::HighFreq, self.high_freq),
            (ParamField::BassBoost, self.bass_boost),
            (ParamField::VoiceMidFreq, self.voice_mid_freq),
            (ParamField::HighFreqSmooth, self.high_freq_smooth),
            (ParamField::LowFreqClear, self.low_freq_clear),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }

    /// Parse a CLI-style `field=value` assignment, e.g. `reverb=30`.
    pub fn parse_assignment(&mut self, assignment: &str) -> Result<(), String> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected field=value, got '{assignment}'"))?;
        let name = name.trim();
        let value = value.trim();
        match name {
            "outputFormat" => {
                self.output_format = Some(
                    serde_json::from_value(serde_json::Value::String(value.to_uppercase()))
                        .map_err(|_| format!("unknown output format '{value}'"))?,
                );
            }
            "sampleRate" => {
                self.sample_rate = Some(
                    serde_json::from_value(serde_json::Value::String(value.to_string()))
                        .map_err(|_| format!("unknown sample rate '{value}'"))?,
                );
            }
            "bitRate" => {
                self.bit_rate = Some(BitRate::try_from(value.to_string())?);
            }
            _ => {
                let field = ParamField::from_name(name).ok_or_else(|| format!("unknown parameter '{name}'"))?;
                let v: f64 = value.parse().map_err(|_| format!("'{value}' is not a number"))?;
                self.set(field, v);
            }
        }
        Ok(())
    }
}

/// Holds the current parameter set.
///
/// Mutations are synchronous and only update the stored value; scheduling a
/// render is the coordinator's job.
#[derive(Debug, Clone)]
pub struct ParamStore {
    current: ProcessingParams,
}

impl ParamStore {
    /// Store initialised with the `recommended` preset.
    pub fn new() -> Self {
        ParamStore { current: Preset::Recommended.params() }
    }

    /// `recommended` with `initial` merged over it.
    pub fn with_initial(initial: &ParamsPatch) -> Self {
        ParamStore { current: Preset::Recommended.params().merged(initial) }
    }

    pub fn get(&self) -> ProcessingParams {
        self.current
    }

    pub fn update(&mut self, patch: &ParamsPatch) -> ProcessingParams {
        self.current = self.current.merged(patch);
        self.current
    }

    /// Replace the whole set with `preset`. `Custom` keeps the current values.
    pub fn apply_preset(&mut self, preset: Preset) -> ProcessingParams {
        if let Some(params) = preset.template() {
            self.current = params;
        }
        self.current
    }

    pub fn reset(&mut self) -> ProcessingParams {
        self.apply_preset(Preset::Recommended)
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_starts_at_recommended() {
        let store = ParamStore::new();
        assert_eq!(store.get(), Preset::Recommended.params());
    }

    #[test]
    fn update_merges_and_clamps_touched_fields() {
        let mut store = ParamStore::new();
        let before = store.get();
        let mut patch = ParamsPatch::single(ParamField::Reverb, 140.0);
        patch.set(ParamField::LowFreq, -35.0);
        let after = store.update(&patch);

        assert_eq!(after.reverb, 100.0);
        assert_eq!(after.low_freq, -20.0);
        assert_eq!(after.clarity, before.clarity, "untouched field must survive the merge");
        assert_eq!(after.output_format, before.output_format);
    }

    #[test]
    fn non_finite_values_fall_back_to_neutral() {
        let mut store = ParamStore::new();
        let mut patch = ParamsPatch::single(ParamField::VolumeGain, f64::NAN);
        patch.set(ParamField::MidFreq, f64::INFINITY);
        patch.set(ParamField::StereoWidth, f64::NEG_INFINITY);
        let p = store.update(&patch);
        assert_eq!(p.volume_gain, 50.0);
        assert_eq!(p.mid_freq, 0.0);
        assert_eq!(p.stereo_width, 50.0);
    }

    #[test]
    fn custom_preset_keeps_current_values() {
        let mut store = ParamStore::new();
        store.update(&ParamsPatch::single(ParamField::Clarity, 12.0));
        let p = store.apply_preset(Preset::Custom);
        assert_eq!(p.clarity, 12.0);
    }

    #[test]
    fn preset_replaces_instead_of_merging() {
        let mut store = ParamStore::new();
        store.update(&ParamsPatch::single(ParamField::Reverb, 80.0));
        let p = store.apply_preset(Preset::Highest);
        assert_eq!(p, Preset::Highest.params());
        assert_eq!(p.reverb, 0.0);
    }

    #[test]
    fn reset_returns_to_recommended() {
        let mut store = ParamStore::new();
        store.apply_preset(Preset::Standard);
        assert_eq!(store.reset(), Preset::Recommended.params());
    }

    #[test]
    fn initial_patch_is_merged_over_recommended() {
        let patch = ParamsPatch::single(ParamField::DecayTime, 70.0);
        let store = ParamStore::with_initial(&patch);
        assert_eq!(store.get().decay_time, 70.0);
        assert_eq!(store.get().clarity, 85.0);
    }

    #[test]
    fn sanitized_clamps_every_field() {
        let mut raw = ProcessingParams::NEUTRAL;
        raw.clarity = 400.0;
        raw.high_freq = f64::NAN;
        raw.bass_boost = -3.0;
        let p = raw.sanitized();
        assert_eq!(p.clarity, 100.0);
        assert_eq!(p.high_freq, 0.0);
        assert_eq!(p.bass_boost, 0.0);
    }

    #[test]
    fn params_use_camel_case_json() {
        let json = serde_json::to_value(Preset::Standard.params()).unwrap();
        assert_eq!(json["outputFormat"], "OPUS");
        assert_eq!(json["sampleRate"], "44.1kHz");
        assert_eq!(json["bitRate"], "128");
        assert_eq!(json["noiseReduction"], 40.0);
    }

    #[test]
    fn patch_deserializes_partial_json() {
        let patch: ParamsPatch = serde_json::from_str(r#"{"reverb": 30, "bitRate": "320"}"#).unwrap();
        assert_eq!(patch.reverb, Some(30.0));
        assert_eq!(patch.bit_rate, BitRate::new(320));
        assert_eq!(patch.clarity, None);
    }

    #[test]
    fn unknown_bit_rate_is_rejected() {
        assert!(serde_json::from_str::<ParamsPatch>(r#"{"bitRate": "77"}"#).is_err());
    }

    #[test]
    fn assignment_parsing() {
        let mut patch = ParamsPatch::default();
        patch.parse_assignment("highFreq=-4.5").unwrap();
        patch.parse_assignment("outputFormat=mp3").unwrap();
        patch.parse_assignment("sampleRate=48kHz").unwrap();
        assert_eq!(patch.high_freq, Some(-4.5));
        assert_eq!(patch.output_format, Some(OutputFormat::Mp3));
        assert_eq!(patch.sample_rate, Some(SampleRateLabel::Khz48));
        assert!(patch.parse_assignment("loudness=3").is_err());
        assert!(patch.parse_assignment("reverb").is_err());
    }

    #[test]
    fn quality_label_depends_on_format() {
        let b = BitRate::new(160).unwrap();
        assert_eq!(b.quality_label(OutputFormat::Opus), "160kbps");
        assert_eq!(b.quality_label(OutputFormat::Wav), "160bit");
    }
}
