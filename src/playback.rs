//! Bounded playback — preview a segment and stop at its end.
//!
//! Two stop mechanisms run side by side while a segment plays: a position
//! poll that stops once `position >= end - tolerance`, and a fallback timer
//! armed for the segment length plus a margin. The poll can be starved
//! when the host is busy; the timer still fires. Whichever wins, both are
//! torn down together.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::PlaybackError;
use crate::segment::{Segment, validate};

/// Output device seen by the scheduler. Implementations wrap whatever
/// actually produces sound (a media element, a cpal stream, a test clock).
pub trait PlaybackDevice: Send + Sync + 'static {
    fn play(&self) -> Result<(), PlaybackError>;
    fn pause(&self);
    fn seek(&self, secs: f64);
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;
    /// Source duration in seconds.
    fn duration(&self) -> f64;
    /// True once the device has played to the end of the source.
    fn ended(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    /// `segment` is `None` for plain, unbounded playback.
    Playing { segment: Option<Segment> },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}

/// Why playback returned to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    ReachedEnd,
    FallbackTimer,
    SourceEnded,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    poll_interval: Duration,
    stop_tolerance: f64,
    fallback_margin: Duration,
}

struct Session {
    id: u64,
    task: Option<JoinHandle<()>>,
    last_stop: Option<StopReason>,
}

struct Shared<D> {
    device: D,
    session: Mutex<Session>,
    state: watch::Sender<PlaybackState>,
}

impl<D> Shared<D> {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives a [`PlaybackDevice`] through `Idle -> Playing -> Idle`.
pub struct PlaybackScheduler<D: PlaybackDevice> {
    shared: Arc<Shared<D>>,
    timing: Timing,
}

impl<D: PlaybackDevice> PlaybackScheduler<D> {
    pub fn new(device: D, config: &EngineConfig) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        PlaybackScheduler {
            shared: Arc::new(Shared {
                device,
                session: Mutex::new(Session { id: 0, task: None, last_stop: None }),
                state,
            }),
            timing: Timing {
                poll_interval: config.poll_interval(),
                stop_tolerance: config.stop_tolerance_secs,
                fallback_margin: Duration::from_millis(config.fallback_margin_ms),
            },
        }
    }

    pub fn device(&self) -> &D {
        &self.shared.device
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state.subscribe()
    }

    pub fn last_stop(&self) -> Option<StopReason> {
        self.shared.lock().last_stop
    }

    /// Play `segment` from its start, or stop if something is already
    /// playing. Must be called from within a Tokio runtime.
    pub fn toggle_segment(&self, segment: &Segment) -> Result<PlaybackState, PlaybackError> {
        if self.state().is_playing() {
            self.stop();
            return Ok(PlaybackState::Idle);
        }
        let duration = self.shared.device.duration();
        if !validate(segment, duration) {
            return Err(PlaybackError::InvalidSegment { start: segment.start_time, end: segment.end_time });
        }
        self.shared.device.seek(segment.start_time);
        let fallback = Duration::from_secs_f64(segment.length()) + self.timing.fallback_margin;
        self.start(Some(segment.clone()), Some(fallback))
    }

    /// Plain play/pause over the whole source.
    pub fn toggle_play(&self) -> Result<PlaybackState, PlaybackError> {
        if self.state().is_playing() {
            self.stop();
            return Ok(PlaybackState::Idle);
        }
        self.start(None, None)
    }

    /// Move the playback position without changing the state. Ignores
    /// non-finite and negative positions.
    pub fn seek(&self, secs: f64) {
        if secs.is_finite() && secs >= 0.0 {
            self.shared.device.seek(secs.min(self.shared.device.duration().max(0.0)));
        }
    }

    /// Stop playback and cancel both stop mechanisms.
    pub fn stop(&self) {
        let mut session = self.shared.lock();
        session.id += 1;
        if let Some(task) = session.task.take() {
            task.abort();
        }
        if self.shared.state.borrow().is_playing() {
            self.shared.device.pause();
            session.last_stop = Some(StopReason::Requested);
            self.shared.state.send_replace(PlaybackState::Idle);
        }
    }

    fn start(&self, segment: Option<Segment>, fallback: Option<Duration>) -> Result<PlaybackState, PlaybackError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlaybackError::DeviceRejected { reason: e.to_string() })?;

        let mut session = self.shared.lock();
        session.id += 1;
        if let Some(task) = session.task.take() {
            task.abort();
        }
        if let Err(e) = self.shared.device.play() {
            warn!("Playback device refused to start: {}", e);
            self.shared.state.send_replace(PlaybackState::Idle);
            return Err(e);
        }

        let state = PlaybackState::Playing { segment: segment.clone() };
        self.shared.state.send_replace(state.clone());

        let end = segment.as_ref().map(|s| s.end_time);
        let deadline = fallback.map(|d| Instant::now() + d);
        let shared = Arc::clone(&self.shared);
        let id = session.id;
        let timing = self.timing;
        session.task = Some(runtime.spawn(async move {
            let reason = supervise(&shared.device, end, deadline, timing).await;
            finish(&shared, id, reason);
        }));
        Ok(state)
    }
}

impl<D: PlaybackDevice> Drop for PlaybackScheduler<D> {
    fn drop(&mut self) {
        if let Some(task) = self.shared.lock().task.take() {
            task.abort();
        }
    }
}

async fn supervise<D: PlaybackDevice>(
    device: &D,
    end: Option<f64>,
    deadline: Option<Instant>,
    timing: Timing,
) -> StopReason {
    let fallback = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(fallback);

    let mut poll = tokio::time::interval(timing.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut fallback => return StopReason::FallbackTimer,
            _ = poll.tick() => {
                if device.ended() {
                    return StopReason::SourceEnded;
                }
                if let Some(end) = end {
                    if device.current_time() >= end - timing.stop_tolerance {
                        return StopReason::ReachedEnd;
                    }
                }
            }
        }
    }
}

fn finish<D: PlaybackDevice>(shared: &Shared<D>, id: u64, reason: StopReason) {
    let mut session = shared.lock();
    // A newer session owns the device now
    if session.id != id {
        return;
    }
    shared.device.pause();
    session.task = None;
    session.last_stop = Some(reason);
    shared.state.send_replace(PlaybackState::Idle);
    debug!("Playback stopped: {:?}", reason);
}
