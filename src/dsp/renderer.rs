//! Offline renderer — runs the signal chain over a decoded clip.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::config::{ChainProfile, EngineConfig};
use crate::error::RenderError;
use crate::params::ProcessingParams;
use crate::segment::Segment;

use super::chain::build_chain;

/// Renders a source (or a segment of it) through a freshly built chain.
///
/// Stateless between calls: every render builds its own chain and, when
/// reverb is on, its own impulse.
#[derive(Debug, Clone)]
pub struct OfflineRenderer {
    profile: ChainProfile,
    reverb_seed: Option<u64>,
}

impl OfflineRenderer {
    pub fn new(profile: ChainProfile, reverb_seed: Option<u64>) -> Self {
        Self { profile, reverb_seed }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.profile, config.reverb_seed)
    }

    pub fn profile(&self) -> ChainProfile {
        self.profile
    }

    /// Render `source` with `params`. With `segment`, only
    /// `[start_time, end_time)` is processed and the output has exactly
    /// `floor(end*sr) - floor(start*sr)` frames; otherwise the output has
    /// the source's frame count. Channel count and sample rate always
    /// match the source.
    pub fn render(
        &self,
        source: &AudioBuffer,
        params: &ProcessingParams,
        segment: Option<&Segment>,
    ) -> Result<AudioBuffer, RenderError> {
        source.validate()?;
        let input = match segment {
            Some(seg) => source.crop(seg.start_time, seg.end_time)?,
            None => source.clone(),
        };
        let params = params.sanitized();

        let mut rng = match self.reverb_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let context = build_chain(&params, input.sample_rate(), self.profile, &mut rng);
        debug!(
            "Rendering {} frames x {} ch at {} Hz through {:?}",
            input.frames(),
            input.channel_count(),
            input.sample_rate(),
            context.stage_names()
        );
        context.run(input)
    }
}

impl Default for OfflineRenderer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::Preset;

    fn tone(sample_rate: u32, secs: f64, channels: usize) -> AudioBuffer {
        let frames = (sample_rate as f64 * secs) as usize;
        let data: Vec<f32> = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect();
        AudioBuffer::new(sample_rate, vec![data; channels]).unwrap()
    }

    #[test]
    fn full_render_keeps_shape() {
        let source = tone(8000, 1.5, 2);
        let out = OfflineRenderer::default().render(&source, &Preset::Recommended.params(), None).unwrap();
        assert_eq!(out.frames(), source.frames());
        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.sample_rate(), 8000);
    }

    #[test]
    fn segment_render_has_exact_frame_count() {
        let source = tone(8000, 10.0, 1);
        let segment = Segment::new(0.0, 2.0);
        let out = OfflineRenderer::default()
            .render(&source, &Preset::Standard.params(), Some(&segment))
            .unwrap();
        assert_eq!(out.frames(), 2 * 8000);
        assert_eq!(out.channel_count(), 1);
    }

    #[test]
    fn renders_without_reverb_are_identical() {
        let source = tone(8000, 1.0, 2);
        let mut params = Preset::Highest.params();
        params.reverb = 0.0;
        let renderer = OfflineRenderer::default();
        let a = renderer.render(&source, &params, None).unwrap();
        let b = renderer.render(&source, &params, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_reverb_is_reproducible() {
        let source = tone(8000, 0.5, 2);
        let mut params = Preset::Recommended.params();
        params.reverb = 40.0;
        let renderer = OfflineRenderer::new(ChainProfile::Professional, Some(11));
        let a = renderer.render(&source, &params, None).unwrap();
        let b = renderer.render(&source, &params, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_params_do_not_produce_nan() {
        let source = tone(8000, 0.5, 1);
        let mut params = ProcessingParams::NEUTRAL;
        params.clarity = 1e9;
        params.low_freq_clear = f64::NAN;
        params.volume_gain = f64::INFINITY;
        let out = OfflineRenderer::default().render(&source, &params, None).unwrap();
        assert!(out.channel(0).iter().all(|s| s.is_finite()));
    }

    #[test]
    fn segment_outside_source_is_rejected() {
        let source = tone(8000, 1.0, 1);
        let segment = Segment::new(0.5, 3.0);
        let err = OfflineRenderer::default()
            .render(&source, &ProcessingParams::NEUTRAL, Some(&segment))
            .unwrap_err();
        assert_eq!(err.code(), "render.invalid_segment");
    }
}
