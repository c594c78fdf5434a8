//! Tracking session control.
//!
//! A session walks `Idle → Active → Stopped → Idle`. Start subscribes to
//! the provider and arms the time budget; every raw event is mapped
//! against a fresh surface rect and appended to the buffer; stop drains
//! the capture worker, aggregates, flushes through the sink, and resets.
//! Stopping is idempotent, so a manual stop racing the timeout flushes
//! exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use oculo_common::clock::SessionClock;
use oculo_common::config::TrackingDefaults;
use oculo_common::error::{OculoError, OculoResult};
use oculo_heatmap_core::aggregate::{aggregate, FrequencyMap};
use oculo_survey_model::gaze::{GazeSample, RawGazeEvent, SessionContext};

use crate::buffer::SampleBuffer;
use crate::mapper::map_raw_event;
use crate::provider::{GazeProvider, SurfaceProbe};

/// Receives a stopped session's samples for persistence.
#[async_trait::async_trait]
pub trait SampleSink: Send + Sync {
    /// Persist the samples of one session. Returns how many were
    /// accepted; partial success is possible and not rolled back.
    async fn flush(&self, ctx: &SessionContext, samples: &[GazeSample]) -> OculoResult<u64>;
}

/// Discards everything; for offline capture and tests.
pub struct NullSink;

#[async_trait::async_trait]
impl SampleSink for NullSink {
    async fn flush(&self, _ctx: &SessionContext, samples: &[GazeSample]) -> OculoResult<u64> {
        Ok(samples.len() as u64)
    }
}

/// Configuration for tracking sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time budget before the session stops automatically.
    pub timeout: Duration,

    /// Capacity of the raw-event delivery channel.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            channel_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn from_defaults(defaults: &TrackingDefaults) -> Self {
        Self {
            timeout: Duration::from_secs(defaults.session_timeout_secs),
            channel_capacity: defaults.channel_capacity,
        }
    }
}

/// State of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; ready to start.
    Idle,
    /// Capturing samples.
    Active,
    /// Stop in progress; transient while the flush runs.
    Stopped,
}

/// What a stopped session produced.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The session's key and surface dimensions.
    pub context: SessionContext,

    /// The captured samples, in arrival order.
    pub samples: Vec<GazeSample>,

    /// Per-pixel visit counts over the captured samples.
    pub frequency: FrequencyMap,

    /// How many samples the sink accepted.
    pub flushed: u64,
}

struct Inner {
    state: SessionState,
    context: Option<SessionContext>,
    buffer: SampleBuffer,
    provider: Option<Box<dyn GazeProvider>>,
    worker: Option<JoinHandle<u64>>,
    stop_flag: Arc<AtomicBool>,
    timeout_guard: Option<CancellationToken>,
    clock: Option<SessionClock>,
}

/// The process-wide session controller.
///
/// Clones share one state machine; only one session can be active at a
/// time, enforced by the check-and-set under the controller lock.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    config: SessionConfig,
    sink: Arc<dyn SampleSink>,
}

impl SessionController {
    pub fn new(config: SessionConfig, sink: Arc<dyn SampleSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                context: None,
                buffer: SampleBuffer::new(),
                provider: None,
                worker: None,
                stop_flag: Arc::new(AtomicBool::new(false)),
                timeout_guard: None,
                clock: None,
            })),
            config,
            sink,
        }
    }

    /// Current state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Number of samples buffered so far.
    pub async fn buffered(&self) -> usize {
        self.inner.lock().await.buffer.len()
    }

    /// Start a tracking session for one question/image.
    ///
    /// Returns `Ok(false)` without changing state when a session is
    /// already active or the provider is not ready; both are warnings,
    /// not errors, and the operator may retry.
    pub async fn start(
        &self,
        ctx: SessionContext,
        mut provider: Box<dyn GazeProvider>,
        surface: Arc<dyn SurfaceProbe>,
    ) -> OculoResult<bool> {
        let mut inner = self.inner.lock().await;

        if inner.state != SessionState::Idle {
            tracing::warn!(
                state = ?inner.state,
                "Tracking session already in progress; start ignored"
            );
            return Ok(false);
        }

        if !provider.is_ready() {
            tracing::warn!(
                provider = %provider.name(),
                "Tracking provider not ready; start ignored"
            );
            return Ok(false);
        }

        let receiver = provider.subscribe(self.config.channel_capacity)?;
        let clock = SessionClock::start();

        let buffer = SampleBuffer::new();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(run_capture(
            receiver,
            surface,
            buffer.clone(),
            stop_flag.clone(),
            clock.clone(),
        ));

        let guard = CancellationToken::new();
        spawn_timeout(self.clone(), guard.clone(), self.config.timeout);

        tracing::info!(
            survey_id = ctx.key.survey_id,
            user_id = ctx.key.user_id,
            question_id = ctx.key.question_id,
            surface_width = ctx.surface_width,
            surface_height = ctx.surface_height,
            provider = %provider.name(),
            "Tracking session started"
        );

        inner.state = SessionState::Active;
        inner.context = Some(ctx);
        inner.buffer = buffer;
        inner.provider = Some(provider);
        inner.worker = Some(worker);
        inner.stop_flag = stop_flag;
        inner.timeout_guard = Some(guard);
        inner.clock = Some(clock);

        Ok(true)
    }

    /// Stop the active session: drain the worker, aggregate, flush, and
    /// reset to idle.
    ///
    /// A no-op returning `Ok(None)` unless a session is active, which
    /// makes a manual stop racing the timeout safe. Flush failures are
    /// logged, never fatal; the controller always returns to idle.
    pub async fn stop(&self) -> OculoResult<Option<SessionOutcome>> {
        let mut inner = self.inner.lock().await;

        if inner.state != SessionState::Active {
            tracing::debug!(state = ?inner.state, "Stop ignored; no active session");
            return Ok(None);
        }
        inner.state = SessionState::Stopped;

        if let Some(guard) = inner.timeout_guard.take() {
            guard.cancel();
        }
        inner.stop_flag.store(true, Ordering::SeqCst);
        if let Some(mut provider) = inner.provider.take() {
            provider.stop();
        }

        if let Some(worker) = inner.worker.take() {
            match worker.await {
                Ok(accepted) => tracing::info!(accepted, "Capture worker drained"),
                Err(e) => tracing::warn!(error = %e, "Capture worker join failed"),
            }
        }

        let context = inner
            .context
            .take()
            .ok_or_else(|| OculoError::tracking("active session has no context"))?;

        let samples = inner.buffer.snapshot();
        let frequency = aggregate(&samples);
        let elapsed = inner
            .clock
            .take()
            .map(|c| c.elapsed_secs())
            .unwrap_or(0.0);

        let mut flushed = 0;
        if samples.is_empty() {
            tracing::info!("No samples captured; skipping flush");
        } else {
            match self.sink.flush(&context, &samples).await {
                Ok(accepted) => flushed = accepted,
                Err(e) => {
                    // Gaze data is supplementary; losing it must never
                    // block the respondent's survey flow.
                    tracing::warn!(error = %e, "Gaze flush failed; session data lost");
                }
            }
        }

        inner.buffer.clear();
        inner.state = SessionState::Idle;

        tracing::info!(
            samples = samples.len(),
            flushed,
            duration_secs = elapsed,
            "Tracking session stopped"
        );

        Ok(Some(SessionOutcome {
            context,
            samples,
            frequency,
            flushed,
        }))
    }
}

/// Consume raw events until the channel closes or the stop flag is set,
/// mapping each against a fresh surface rect.
async fn run_capture(
    mut receiver: mpsc::Receiver<RawGazeEvent>,
    surface: Arc<dyn SurfaceProbe>,
    buffer: SampleBuffer,
    stop_flag: Arc<AtomicBool>,
    clock: SessionClock,
) -> u64 {
    let mut accepted = 0u64;

    while let Some(raw) = receiver.recv().await {
        // Guards against stray events queued behind a stop.
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }

        let rect = surface.bounding_rect();
        if let Some(sample) = map_raw_event(&raw, &rect, clock.now_ms()) {
            buffer.append(sample);
            accepted += 1;
        }
    }

    accepted
}

/// Arm the session time budget. The guard token is cancelled by a
/// manual stop; cancellation never interrupts a flush already underway.
fn spawn_timeout(controller: SessionController, guard: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = guard.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::info!(timeout_secs = timeout.as_secs(), "Session time budget elapsed");
                if let Err(e) = controller.stop().await {
                    tracing::warn!(error = %e, "Automatic session stop failed");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use oculo_survey_model::gaze::{SessionKey, SurfaceRect};

    use crate::provider::{FixedSurface, ScriptedProvider};

    /// Counts flush calls and remembers flushed sample counts.
    #[derive(Default)]
    struct MemorySink {
        flushes: StdMutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl SampleSink for MemorySink {
        async fn flush(&self, _ctx: &SessionContext, samples: &[GazeSample]) -> OculoResult<u64> {
            self.flushes.lock().unwrap().push(samples.len());
            Ok(samples.len() as u64)
        }
    }

    /// Always fails, to exercise the best-effort path.
    struct FailingSink;

    #[async_trait::async_trait]
    impl SampleSink for FailingSink {
        async fn flush(&self, _ctx: &SessionContext, _samples: &[GazeSample]) -> OculoResult<u64> {
            Err(OculoError::storage("flush rejected"))
        }
    }

    fn ctx() -> SessionContext {
        SessionContext::new(SessionKey::new(1, 2, 3), 100, 100)
    }

    fn surface() -> Arc<dyn SurfaceProbe> {
        Arc::new(FixedSurface::new(SurfaceRect::new(10.0, 10.0, 100.0, 100.0)))
    }

    #[tokio::test]
    async fn full_session_maps_filters_and_flushes() {
        let sink = Arc::new(MemorySink::default());
        let controller = SessionController::new(SessionConfig::default(), sink.clone());

        let script = vec![
            RawGazeEvent::valid(110.0, 60.0),  // maps to (100, 50), accepted
            RawGazeEvent::valid(200.0, 60.0),  // x = 190 > 100, rejected
            RawGazeEvent::new(50.0, 50.0, -1), // invalid state, rejected
            RawGazeEvent::valid(15.0, 15.0),   // maps to (5, 5), accepted
        ];
        let provider = Box::new(ScriptedProvider::new(script, Duration::ZERO));

        let started = controller.start(ctx(), provider, surface()).await.unwrap();
        assert!(started);
        assert_eq!(controller.state().await, SessionState::Active);

        // Let the scripted provider drain.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outcome = controller.stop().await.unwrap().expect("active session");
        assert_eq!(outcome.samples.len(), 2);
        assert_eq!(outcome.samples[0].x, 100.0);
        assert_eq!(outcome.samples[0].y, 50.0);
        assert_eq!(outcome.frequency.max(), 1);
        assert_eq!(outcome.flushed, 2);
        assert_eq!(*sink.flushes.lock().unwrap(), vec![2]);
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn second_start_while_active_is_ignored() {
        let controller = SessionController::new(SessionConfig::default(), Arc::new(NullSink));

        let slow = Box::new(ScriptedProvider::new(
            vec![RawGazeEvent::valid(50.0, 50.0); 100],
            Duration::from_millis(20),
        ));
        assert!(controller.start(ctx(), slow, surface()).await.unwrap());

        let second = Box::new(ScriptedProvider::new(vec![], Duration::ZERO));
        let started = controller.start(ctx(), second, surface()).await.unwrap();
        assert!(!started);
        assert_eq!(controller.state().await, SessionState::Active);

        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_with_unready_provider_stays_idle() {
        let controller = SessionController::new(SessionConfig::default(), Arc::new(NullSink));
        let provider = Box::new(ScriptedProvider::not_ready());

        let started = controller.start(ctx(), provider, surface()).await.unwrap();
        assert!(!started);
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn empty_session_skips_flush() {
        let sink = Arc::new(MemorySink::default());
        let controller = SessionController::new(SessionConfig::default(), sink.clone());

        let provider = Box::new(ScriptedProvider::new(vec![], Duration::ZERO));
        assert!(controller.start(ctx(), provider, surface()).await.unwrap());

        let outcome = controller.stop().await.unwrap().expect("active session");
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.frequency.max(), 0);
        assert_eq!(outcome.flushed, 0);
        assert!(sink.flushes.lock().unwrap().is_empty());
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn stop_without_session_is_noop() {
        let controller = SessionController::new(SessionConfig::default(), Arc::new(NullSink));
        assert!(controller.stop().await.unwrap().is_none());
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn timeout_stops_session_exactly_once() {
        let sink = Arc::new(MemorySink::default());
        let config = SessionConfig {
            timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let controller = SessionController::new(config, sink.clone());

        let provider = Box::new(ScriptedProvider::new(
            vec![RawGazeEvent::valid(50.0, 50.0); 200],
            Duration::from_millis(5),
        ));
        assert!(controller.start(ctx(), provider, surface()).await.unwrap());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.state().await, SessionState::Idle);
        assert_eq!(sink.flushes.lock().unwrap().len(), 1);

        // A manual stop racing the timeout must not double-flush.
        assert!(controller.stop().await.unwrap().is_none());
        assert_eq!(sink.flushes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn flush_failure_still_resets_to_idle() {
        let controller = SessionController::new(SessionConfig::default(), Arc::new(FailingSink));

        let provider = Box::new(ScriptedProvider::new(
            vec![RawGazeEvent::valid(50.0, 50.0)],
            Duration::ZERO,
        ));
        assert!(controller.start(ctx(), provider, surface()).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outcome = controller.stop().await.unwrap().expect("active session");
        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.flushed, 0);
        assert_eq!(controller.state().await, SessionState::Idle);
    }
}
