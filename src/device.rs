//! Device capabilities — advisory limits reported by the host.
//!
//! The host tells us the highest sample rate its input supports and which
//! output formats it can play. These are hints for the UI; nothing here
//! changes parameters.

use serde::{Deserialize, Serialize};

use crate::params::{OutputFormat, ProcessingParams};

/// Voice-friendly rates, in order of preference.
const VOICE_RATES: [u32; 4] = [48_000, 44_100, 96_000, 192_000];
const FALLBACK_RATE: u32 = 44_100;
/// Assumed when the host cannot probe the device.
const UNPROBED_MAX_RATE: u32 = 48_000;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceCapabilities {
    pub max_sample_rate: Option<u32>,
    /// Format names such as `"WAV"`; empty means unknown.
    pub supported_formats: Vec<String>,
}

/// A parameter the device may not honour.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityAdvisory {
    SampleRateAboveDevice { requested: u32, max: u32 },
    FormatUnsupported { format: OutputFormat },
}

impl CapabilityAdvisory {
    pub fn message(&self) -> String {
        match self {
            CapabilityAdvisory::SampleRateAboveDevice { requested, max } => format!(
                "{} exceeds the device maximum of {}",
                format_sample_rate(Some(*requested)),
                format_sample_rate(Some(*max))
            ),
            CapabilityAdvisory::FormatUnsupported { format } => {
                format!("{} is not listed as supported by this device", format.as_str())
            }
        }
    }
}

impl DeviceCapabilities {
    pub fn new(max_sample_rate: Option<u32>, supported_formats: Vec<String>) -> Self {
        DeviceCapabilities { max_sample_rate, supported_formats }
    }

    /// What to assume when probing the device failed.
    pub fn unprobed() -> Self {
        DeviceCapabilities { max_sample_rate: Some(UNPROBED_MAX_RATE), supported_formats: Vec::new() }
    }

    /// False when the maximum is unknown.
    pub fn is_sample_rate_supported(&self, rate: u32) -> bool {
        self.max_sample_rate.is_some_and(|max| rate <= max)
    }

    /// First of 48k, 44.1k, 96k, 192k that the device supports, else 44.1k.
    pub fn recommended_voice_sample_rate(&self) -> u32 {
        let Some(max) = self.max_sample_rate else {
            return FALLBACK_RATE;
        };
        VOICE_RATES.iter().copied().find(|&r| r <= max).unwrap_or(FALLBACK_RATE)
    }

    pub fn supports_format(&self, format: OutputFormat) -> Option<bool> {
        if self.supported_formats.is_empty() {
            return None;
        }
        Some(self.supported_formats.iter().any(|f| f.trim().eq_ignore_ascii_case(format.as_str())))
    }

    /// Check `params` against the device. Never modifies anything.
    pub fn advise(&self, params: &ProcessingParams) -> Vec<CapabilityAdvisory> {
        let mut advisories = Vec::new();
        let requested = params.sample_rate.hz();
        if let Some(max) = self.max_sample_rate {
            if requested > max {
                advisories.push(CapabilityAdvisory::SampleRateAboveDevice { requested, max });
            }
        }
        if self.supports_format(params.output_format) == Some(false) {
            advisories.push(CapabilityAdvisory::FormatUnsupported { format: params.output_format });
        }
        advisories
    }
}

/// `"44.1kHz"` for rates of 1 kHz and up, `"800Hz"` below, `"unknown"` for none.
pub fn format_sample_rate(rate: Option<u32>) -> String {
    match rate {
        None | Some(0) => "unknown".to_string(),
        Some(r) if r >= 1000 => format!("{:.1}kHz", r as f64 / 1000.0),
        Some(r) => format!("{r}Hz"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SampleRateLabel;
    use crate::preset::Preset;

    #[test]
    fn recommended_rate_prefers_48k() {
        let caps = DeviceCapabilities::new(Some(192_000), vec![]);
        assert_eq!(caps.recommended_voice_sample_rate(), 48_000);
        let caps = DeviceCapabilities::new(Some(44_100), vec![]);
        assert_eq!(caps.recommended_voice_sample_rate(), 44_100);
        let caps = DeviceCapabilities::new(Some(16_000), vec![]);
        assert_eq!(caps.recommended_voice_sample_rate(), 44_100);
        assert_eq!(DeviceCapabilities::default().recommended_voice_sample_rate(), 44_100);
    }

    #[test]
    fn rate_support_needs_a_known_max() {
        let caps = DeviceCapabilities::unprobed();
        assert!(caps.is_sample_rate_supported(48_000));
        assert!(!caps.is_sample_rate_supported(96_000));
        assert!(!DeviceCapabilities::default().is_sample_rate_supported(8_000));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_sample_rate(Some(44_100)), "44.1kHz");
        assert_eq!(format_sample_rate(Some(48_000)), "48.0kHz");
        assert_eq!(format_sample_rate(Some(800)), "800Hz");
        assert_eq!(format_sample_rate(None), "unknown");
    }

    #[test]
    fn advisories_do_not_touch_params() {
        let caps = DeviceCapabilities::new(Some(48_000), vec!["wav".to_string(), "MP3".to_string()]);
        let params = Preset::Recommended.params();
        let before = params;
        let advice = caps.advise(&params);
        assert_eq!(params, before);
        assert_eq!(
            advice,
            vec![
                CapabilityAdvisory::SampleRateAboveDevice { requested: 96_000, max: 48_000 },
                CapabilityAdvisory::FormatUnsupported { format: OutputFormat::Opus },
            ]
        );
        assert!(advice[0].message().contains("96.0kHz"));
    }

    #[test]
    fn unknown_formats_produce_no_advice() {
        let caps = DeviceCapabilities::new(Some(96_000), vec![]);
        let mut params = Preset::Standard.params();
        params.sample_rate = SampleRateLabel::Khz48;
        assert!(caps.advise(&params).is_empty());
    }
}
