//! Render coordinator — debounced, latest-wins background rendering.
//!
//! A single actor task owns the parameter store, the loaded source and the
//! "current result" slot. Handles talk to it over a command channel and
//! observe it through a `watch` channel, so there is exactly one writer.
//!
//! Scheduling rules:
//! - every parameter mutation re-arms a debounce deadline; only the last
//!   snapshot inside the window is rendered
//! - a request that fires while a render is running waits in a queue of
//!   depth one, and a newer request replaces it
//! - every fired request gets a new generation number; a completion is only
//!   published if it carries the latest generation, otherwise it is dropped
//! - the previous result's resource is released before a new one is
//!   published

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::buffer::AudioBuffer;
use crate::codec::encode_wav;
use crate::config::EngineConfig;
use crate::dsp::renderer::OfflineRenderer;
use crate::error::RenderError;
use crate::params::{OutputFormat, ParamStore, ParamsPatch, ProcessingParams};
use crate::preset::Preset;
use crate::segment::Segment;

/// Anything that can turn a source and a parameter snapshot into audio.
pub trait RenderBackend: Send + Sync + 'static {
    fn render(
        &self,
        source: &AudioBuffer,
        params: &ProcessingParams,
        segment: Option<&Segment>,
    ) -> Result<AudioBuffer, RenderError>;
}

impl RenderBackend for OfflineRenderer {
    fn render(
        &self,
        source: &AudioBuffer,
        params: &ProcessingParams,
        segment: Option<&Segment>,
    ) -> Result<AudioBuffer, RenderError> {
        OfflineRenderer::render(self, source, params, segment)
    }
}

// ── Resources ───────────────────────────────────────────────

/// Opaque reference to an encoded result held by a [`ResourceRegistry`]
/// (an object URL in a browser, a map entry here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

pub trait ResourceRegistry: Send + Sync + 'static {
    fn register(&self, bytes: Arc<[u8]>) -> ResourceHandle;
    /// Releasing an unknown or already released handle is a no-op.
    fn release(&self, handle: ResourceHandle);
}

/// Registry that keeps encoded bytes in a map until released.
#[derive(Debug, Default)]
pub struct InMemoryResources {
    next: AtomicU64,
    live: Mutex<HashMap<u64, Arc<[u8]>>>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, handle: ResourceHandle) -> Option<Arc<[u8]>> {
        self.live.lock().unwrap_or_else(|p| p.into_inner()).get(&handle.0).cloned()
    }

    /// Number of resources registered and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl ResourceRegistry for InMemoryResources {
    fn register(&self, bytes: Arc<[u8]>) -> ResourceHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.lock().unwrap_or_else(|p| p.into_inner()).insert(id, bytes);
        ResourceHandle(id)
    }

    fn release(&self, handle: ResourceHandle) {
        self.live.lock().unwrap_or_else(|p| p.into_inner()).remove(&handle.0);
    }
}

// ── Published state ─────────────────────────────────────────

/// A published render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResult {
    pub generation: u64,
    pub handle: ResourceHandle,
    /// Encoded 16-bit PCM WAV.
    pub wav: Arc<[u8]>,
    pub params: ProcessingParams,
    /// Format the parameters asked for.
    pub requested_format: OutputFormat,
    /// Format actually written. Always WAV.
    pub emitted_format: OutputFormat,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
}

impl RenderedResult {
    pub fn duration(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// True when the output is not in the format that was requested.
    pub fn format_degraded(&self) -> bool {
        self.requested_format != self.emitted_format
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Requests that left the debounce window (or were forced).
    pub requested: u64,
    /// Renders handed to a worker.
    pub started: u64,
    pub published: u64,
    pub failed: u64,
    /// Completions dropped because a newer generation exists.
    pub discarded: u64,
    /// Queued requests replaced before they started.
    pub superseded: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub current: Option<Arc<RenderedResult>>,
    pub is_processing: bool,
    /// A debounce window is open or a request is queued.
    pub pending: bool,
    pub params: ProcessingParams,
    pub last_error: Option<RenderError>,
    pub stats: RenderStats,
}

impl RenderState {
    /// Nothing running and nothing scheduled.
    pub fn is_settled(&self) -> bool {
        !self.is_processing && !self.pending
    }
}

// ── Actor ───────────────────────────────────────────────────

enum Command {
    Update(ParamsPatch, oneshot::Sender<ProcessingParams>),
    ApplyPreset(Preset, oneshot::Sender<ProcessingParams>),
    Reset(oneshot::Sender<ProcessingParams>),
    ProcessNow(oneshot::Sender<()>),
    SetSource(Option<Arc<AudioBuffer>>, oneshot::Sender<()>),
}

struct Request {
    generation: u64,
    params: ProcessingParams,
    source: Arc<AudioBuffer>,
}

struct Output {
    wav: Vec<u8>,
    sample_rate: u32,
    channels: usize,
    frames: usize,
}

struct InFlight {
    generation: u64,
    params: ProcessingParams,
    handle: JoinHandle<Result<Output, RenderError>>,
}

enum Event {
    Command(Command),
    Closed,
    DebounceElapsed,
    Finished(u64, ProcessingParams, Result<Output, RenderError>),
}

struct Worker<B, R> {
    backend: Arc<B>,
    resources: Arc<R>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<RenderState>,
    store: ParamStore,
    source: Option<Arc<AudioBuffer>>,
    debounce: std::time::Duration,
    deadline: Option<Instant>,
    generation: u64,
    in_flight: Option<InFlight>,
    queued: Option<Request>,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn join_in_flight(slot: &mut Option<InFlight>) -> (u64, ProcessingParams, Result<Output, RenderError>) {
    match slot {
        Some(job) => {
            let joined = (&mut job.handle).await;
            let result = joined.unwrap_or_else(|e| {
                warn!("Render worker failed: {}", e);
                Err(RenderError::Interrupted)
            });
            (job.generation, job.params, result)
        }
        None => std::future::pending().await,
    }
}

impl<B: RenderBackend, R: ResourceRegistry> Worker<B, R> {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => Event::Closed,
                },
                _ = sleep_until_deadline(self.deadline), if self.deadline.is_some() => Event::DebounceElapsed,
                (generation, params, result) = join_in_flight(&mut self.in_flight) => {
                    Event::Finished(generation, params, result)
                }
            };

            match event {
                Event::Command(cmd) => self.handle(cmd),
                Event::DebounceElapsed => {
                    self.deadline = None;
                    trace!("Debounce window elapsed");
                    self.fire(false);
                }
                Event::Finished(generation, params, result) => {
                    self.in_flight = None;
                    self.complete(generation, params, result);
                    if let Some(next) = self.queued.take() {
                        self.start(next);
                    }
                }
                Event::Closed => break,
            }
            self.publish_flags();
        }

        if let Some(job) = self.in_flight.take() {
            job.handle.abort();
        }
        if let Some(current) = self.state.borrow().current.as_ref() {
            self.resources.release(current.handle);
        }
        debug!("Render coordinator stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Update(patch, reply) => {
                let params = self.store.update(&patch);
                self.params_changed(params, reply);
            }
            Command::ApplyPreset(preset, reply) => {
                let params = self.store.apply_preset(preset);
                self.params_changed(params, reply);
            }
            Command::Reset(reply) => {
                let params = self.store.reset();
                self.params_changed(params, reply);
            }
            Command::ProcessNow(ack) => {
                self.deadline = None;
                self.fire(true);
                self.publish_flags();
                let _ = ack.send(());
            }
            Command::SetSource(source, ack) => {
                self.source = source;
                self.deadline = None;
                // Anything queued or running refers to the old source
                self.generation += 1;
                if self.queued.take().is_some() {
                    self.bump(|s| s.superseded += 1);
                }
                if self.source.is_some() {
                    self.fire(false);
                } else {
                    self.clear_current();
                }
                self.publish_flags();
                let _ = ack.send(());
            }
        }
    }

    fn params_changed(&mut self, params: ProcessingParams, reply: oneshot::Sender<ProcessingParams>) {
        self.state.send_modify(|s| s.params = params);
        self.deadline = Some(Instant::now() + self.debounce);
        self.publish_flags();
        // The caller may have stopped waiting; the change still stands
        let _ = reply.send(params);
    }

    /// Turn the current snapshot into a request: start it, or park it in
    /// the single queue slot.
    fn fire(&mut self, forced: bool) {
        let Some(source) = self.source.clone() else {
            if forced {
                self.state.send_modify(|s| s.last_error = Some(RenderError::NoSource));
            } else {
                trace!("No source loaded; nothing to render");
            }
            return;
        };
        self.generation += 1;
        let request = Request { generation: self.generation, params: self.store.get(), source };
        self.bump(|s| s.requested += 1);

        if self.in_flight.is_some() {
            if let Some(old) = self.queued.replace(request) {
                debug!("Queued render {} replaced by {}", old.generation, self.generation);
                self.bump(|s| s.superseded += 1);
            }
        } else {
            self.start(request);
        }
    }

    fn start(&mut self, request: Request) {
        let backend = Arc::clone(&self.backend);
        let Request { generation, params, source } = request;
        debug!("Starting render {}", generation);
        let handle = tokio::task::spawn_blocking(move || {
            let rendered = backend.render(&source, &params, None)?;
            Ok(Output {
                wav: encode_wav(&rendered),
                sample_rate: rendered.sample_rate(),
                channels: rendered.channel_count(),
                frames: rendered.frames(),
            })
        });
        self.in_flight = Some(InFlight { generation, params, handle });
        self.bump(|s| s.started += 1);
    }

    fn complete(&mut self, generation: u64, params: ProcessingParams, result: Result<Output, RenderError>) {
        if generation != self.generation {
            debug!("Discarding stale render {} (latest is {})", generation, self.generation);
            self.bump(|s| s.discarded += 1);
            return;
        }
        match result {
            Ok(output) => {
                if let Some(previous) = self.state.borrow().current.as_ref() {
                    self.resources.release(previous.handle);
                }
                let wav: Arc<[u8]> = output.wav.into();
                let handle = self.resources.register(Arc::clone(&wav));
                let result = RenderedResult {
                    generation,
                    handle,
                    wav,
                    params,
                    requested_format: params.output_format,
                    emitted_format: OutputFormat::Wav,
                    sample_rate: output.sample_rate,
                    channels: output.channels,
                    frames: output.frames,
                };
                if result.format_degraded() {
                    debug!("{} requested; emitting WAV", params.output_format.as_str());
                }
                info!("Published render {} ({} frames)", generation, result.frames);
                self.state.send_modify(|s| {
                    s.current = Some(Arc::new(result));
                    s.last_error = None;
                    s.stats.published += 1;
                });
            }
            Err(e) => {
                warn!("Render {} failed: {}", generation, e);
                self.state.send_modify(|s| {
                    s.last_error = Some(e);
                    s.stats.failed += 1;
                });
            }
        }
    }

    fn clear_current(&mut self) {
        if let Some(previous) = self.state.borrow().current.as_ref() {
            self.resources.release(previous.handle);
        }
        self.state.send_modify(|s| s.current = None);
    }

    fn publish_flags(&self) {
        let is_processing = self.in_flight.is_some();
        let pending = self.deadline.is_some() || self.queued.is_some();
        self.state.send_if_modified(|s| {
            let changed = s.is_processing != is_processing || s.pending != pending;
            s.is_processing = is_processing;
            s.pending = pending;
            changed
        });
    }

    fn bump(&self, f: impl FnOnce(&mut RenderStats)) {
        self.state.send_modify(|s| f(&mut s.stats));
    }
}

// ── Handle ──────────────────────────────────────────────────

/// Cloneable handle to the coordinator actor. The actor stops when the
/// last handle is dropped and releases the current result on the way out.
#[derive(Clone)]
pub struct RenderCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<RenderState>,
}

impl RenderCoordinator {
    /// Spawn the actor on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn<B: RenderBackend, R: ResourceRegistry>(
        backend: Arc<B>,
        resources: Arc<R>,
        store: ParamStore,
        config: &EngineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RenderState {
            current: None,
            is_processing: false,
            pending: false,
            params: store.get(),
            last_error: None,
            stats: RenderStats::default(),
        });
        let worker = Worker {
            backend,
            resources,
            commands: rx,
            state: state_tx,
            store,
            source: None,
            debounce: config.debounce(),
            deadline: None,
            generation: 0,
            in_flight: None,
            queued: None,
        };
        tokio::spawn(worker.run());
        RenderCoordinator { commands: tx, state: state_rx }
    }

    fn send(&self, cmd: Command) -> Result<(), RenderError> {
        self.commands.send(cmd).map_err(|_| RenderError::Interrupted)
    }

    /// Send a command and wait until the actor has handled it, so the
    /// published state already reflects it.
    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, RenderError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| RenderError::Interrupted)
    }

    /// Merge `patch` into the parameters and schedule a debounced render.
    pub async fn update_params(&self, patch: ParamsPatch) -> Result<ProcessingParams, RenderError> {
        self.ask(|tx| Command::Update(patch, tx)).await
    }

    pub async fn apply_preset(&self, preset: Preset) -> Result<ProcessingParams, RenderError> {
        self.ask(|tx| Command::ApplyPreset(preset, tx)).await
    }

    pub async fn reset_params(&self) -> Result<ProcessingParams, RenderError> {
        self.ask(Command::Reset).await
    }

    /// Render now, skipping the debounce window.
    pub async fn process_now(&self) -> Result<(), RenderError> {
        self.ask(Command::ProcessNow).await
    }

    /// Replace the source. A new source renders immediately; `None` clears
    /// the current result.
    pub async fn set_source(&self, source: Option<Arc<AudioBuffer>>) -> Result<(), RenderError> {
        self.ask(|ack| Command::SetSource(source, ack)).await
    }

    pub fn state(&self) -> RenderState {
        self.state.borrow().clone()
    }

    pub fn params(&self) -> ProcessingParams {
        self.state.borrow().params
    }

    pub fn current_result(&self) -> Option<Arc<RenderedResult>> {
        self.state.borrow().current.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.state.borrow().is_processing
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.state.clone()
    }

    /// Wait until nothing is running or scheduled.
    pub async fn settled(&self) -> Result<RenderState, RenderError> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(RenderState::is_settled).await.map_err(|_| RenderError::Interrupted)?;
        Ok(state.clone())
    }
}
