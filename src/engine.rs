//! Engine façade — one object owning the loaded clip, the selection, the
//! render coordinator and the export paths.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::buffer::AudioBuffer;
use crate::codec::{Decoder, WavDecoder, encode_wav};
use crate::config::EngineConfig;
use crate::coordinator::{InMemoryResources, RenderCoordinator, RenderState, RenderedResult, ResourceHandle};
use crate::device::{CapabilityAdvisory, DeviceCapabilities};
use crate::dsp::renderer::OfflineRenderer;
use crate::error::{PlaybackError, RenderError, ToneError, UploadError};
use crate::params::{OutputFormat, ParamStore, ParamsPatch, ProcessingParams};
use crate::playback::{PlaybackDevice, PlaybackScheduler, PlaybackState};
use crate::preset::Preset;
use crate::segment::{Segment, SegmentManager, crop_file_name};
use crate::upload::{SubmittedClip, Uploader};

/// An encoded export ready to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedClip {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub requested_format: OutputFormat,
    pub emitted_format: OutputFormat,
}

pub struct ToneEngine<D: Decoder = WavDecoder> {
    config: EngineConfig,
    decoder: D,
    renderer: Arc<OfflineRenderer>,
    resources: Arc<InMemoryResources>,
    coordinator: RenderCoordinator,
    source: Option<Arc<AudioBuffer>>,
    segments: SegmentManager,
    capabilities: DeviceCapabilities,
}

impl ToneEngine<WavDecoder> {
    /// Engine with the WAV decoder and `recommended` parameters.
    /// Must be called inside a Tokio runtime.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_decoder(config, WavDecoder, &ParamsPatch::default())
    }

    /// Like [`ToneEngine::new`], with `initial` merged over `recommended`.
    pub fn with_initial(config: EngineConfig, initial: &ParamsPatch) -> Self {
        Self::with_decoder(config, WavDecoder, initial)
    }
}

impl<D: Decoder> ToneEngine<D> {
    pub fn with_decoder(config: EngineConfig, decoder: D, initial: &ParamsPatch) -> Self {
        let renderer = Arc::new(OfflineRenderer::from_config(&config));
        let resources = Arc::new(InMemoryResources::new());
        let coordinator = RenderCoordinator::spawn(
            Arc::clone(&renderer),
            Arc::clone(&resources),
            ParamStore::with_initial(initial),
            &config,
        );
        let segments = SegmentManager::new(config.default_segment_secs, config.min_segment_secs);
        ToneEngine {
            config,
            decoder,
            renderer,
            resources,
            coordinator,
            source: None,
            segments,
            capabilities: DeviceCapabilities::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Source ──────────────────────────────────────────────

    /// Decode and install a new clip. On a decode error nothing changes:
    /// the previous clip, selection and result stay as they were.
    /// Returns the clip duration in seconds.
    pub async fn load(&mut self, bytes: &[u8]) -> Result<f64, ToneError> {
        let buffer = match self.decoder.decode(bytes) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Rejected source ({} bytes): {}", bytes.len(), e);
                return Err(e.into());
            }
        };
        let duration = buffer.duration();
        info!(
            "Loaded source: {:.3}s, {} ch @ {} Hz",
            duration,
            buffer.channel_count(),
            buffer.sample_rate()
        );
        let source = Arc::new(buffer);
        self.source = Some(Arc::clone(&source));
        self.segments.reset(duration);
        self.coordinator.set_source(Some(source)).await?;
        Ok(duration)
    }

    /// Drop the clip, its selection and its rendered result.
    pub async fn unload(&mut self) -> Result<(), ToneError> {
        self.source = None;
        self.segments.clear();
        self.coordinator.set_source(None).await?;
        Ok(())
    }

    pub fn source(&self) -> Option<&Arc<AudioBuffer>> {
        self.source.as_ref()
    }

    pub fn duration(&self) -> f64 {
        self.segments.duration()
    }

    // ── Parameters ──────────────────────────────────────────

    pub async fn update_params(&self, patch: ParamsPatch) -> Result<ProcessingParams, ToneError> {
        Ok(self.coordinator.update_params(patch).await?)
    }

    pub async fn apply_preset(&self, preset: Preset) -> Result<ProcessingParams, ToneError> {
        Ok(self.coordinator.apply_preset(preset).await?)
    }

    pub async fn reset_params(&self) -> Result<ProcessingParams, ToneError> {
        Ok(self.coordinator.reset_params().await?)
    }

    pub async fn process_now(&self) -> Result<(), ToneError> {
        Ok(self.coordinator.process_now().await?)
    }

    pub fn params(&self) -> ProcessingParams {
        self.coordinator.params()
    }

    pub fn render_state(&self) -> RenderState {
        self.coordinator.state()
    }

    pub fn current_result(&self) -> Option<Arc<RenderedResult>> {
        self.coordinator.current_result()
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.coordinator.subscribe()
    }

    /// Wait for the background render queue to drain.
    pub async fn settled(&self) -> Result<RenderState, ToneError> {
        Ok(self.coordinator.settled().await?)
    }

    /// Encoded bytes behind a published result, while it is still live.
    pub fn resolve(&self, handle: ResourceHandle) -> Option<Arc<[u8]>> {
        self.resources.resolve(handle)
    }

    // ── Selection ───────────────────────────────────────────

    pub fn selection(&self) -> Option<&Segment> {
        self.segments.selected()
    }

    pub fn select_segment(&mut self, segment: Segment) -> bool {
        self.segments.select(segment)
    }

    pub fn drag_segment(&self, proposed: &Segment) -> Option<Segment> {
        self.segments.drag(proposed)
    }

    pub fn end_drag(&mut self, proposed: &Segment) -> Option<&Segment> {
        self.segments.end_drag(proposed)
    }

    /// Toggle bounded preview of the selection on `scheduler`.
    pub fn preview_selection<P: PlaybackDevice>(
        &self,
        scheduler: &PlaybackScheduler<P>,
    ) -> Result<PlaybackState, ToneError> {
        if self.source.is_none() {
            return Err(PlaybackError::NoSource.into());
        }
        match self.segments.valid_selection() {
            Some(segment) => Ok(scheduler.toggle_segment(segment)?),
            None => {
                let (start, end) = self
                    .segments
                    .selected()
                    .map_or((f64::NAN, f64::NAN), |s| (s.start_time, s.end_time));
                Err(PlaybackError::InvalidSegment { start, end }.into())
            }
        }
    }

    // ── Device ──────────────────────────────────────────────

    pub fn set_capabilities(&mut self, capabilities: DeviceCapabilities) {
        self.capabilities = capabilities;
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn advisories(&self) -> Vec<CapabilityAdvisory> {
        self.capabilities.advise(&self.params())
    }

    // ── Export ──────────────────────────────────────────────

    /// Render the clip (or `segment` of it) with the current parameters and
    /// encode it. Independent of the background preview render.
    pub fn export(&self, segment: Option<&Segment>) -> Result<ExportedClip, ToneError> {
        let source = self.source.as_ref().ok_or(RenderError::NoSource)?;
        let params = self.params();
        let rendered = self.renderer.render(source, &params, segment)?;
        Ok(ExportedClip {
            file_name: crop_file_name(segment, params.output_format, params.bit_rate),
            bytes: encode_wav(&rendered),
            requested_format: params.output_format,
            emitted_format: OutputFormat::Wav,
        })
    }

    /// Render the selected range, encode it and hand it to `uploader`.
    /// Requires a valid selection. Upload failures are returned as-is.
    pub async fn crop_and_submit<U: Uploader>(&self, uploader: &U) -> Result<SubmittedClip, ToneError> {
        let segment = self.segments.valid_selection().cloned().ok_or(UploadError::NoSelection)?;
        let source = self.source.clone().ok_or(RenderError::NoSource)?;
        let params = self.params();
        let renderer = Arc::clone(&self.renderer);

        let crop = segment.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            renderer.render(&source, &params, Some(&crop)).map(|b| encode_wav(&b))
        })
        .await
        .map_err(|_| RenderError::Interrupted)??;

        let file_name = crop_file_name(Some(&segment), params.output_format, params.bit_rate);
        let file_url = uploader.upload(bytes, &file_name).await?;
        info!("Submitted {} as {}", file_name, file_url);
        Ok(SubmittedClip { file_url, file_type: OutputFormat::Wav.as_str().to_lowercase() })
    }
}
