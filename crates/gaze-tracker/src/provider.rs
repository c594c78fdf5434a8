//! Tracking-provider and surface abstractions.
//!
//! The real eye-tracking provider lives outside this process and pushes
//! raw results at unpredictable times. It is modeled as a source that,
//! once subscribed, delivers events over a bounded channel consumed by
//! the session's capture worker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use oculo_common::error::{OculoError, OculoResult};
use oculo_survey_model::gaze::{RawGazeEvent, SurfaceRect};

/// A source of raw gaze events.
pub trait GazeProvider: Send {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Whether the provider is loaded and ready to deliver events. A
    /// session refuses to start against a provider that is not ready.
    fn is_ready(&self) -> bool;

    /// Begin delivering events over a bounded channel. The channel
    /// closes when tracking ends or [`GazeProvider::stop`] is called.
    fn subscribe(&mut self, capacity: usize) -> OculoResult<mpsc::Receiver<RawGazeEvent>>;

    /// Stop delivering events and release provider resources.
    fn stop(&mut self);
}

/// Answers "where is the tracked surface right now?".
///
/// Layout can shift mid-session (scroll, resize), so the capture worker
/// queries this per sample rather than caching the rect.
pub trait SurfaceProbe: Send + Sync {
    fn bounding_rect(&self) -> SurfaceRect;
}

/// A surface whose rect never moves.
#[derive(Debug, Clone, Copy)]
pub struct FixedSurface {
    rect: SurfaceRect,
}

impl FixedSurface {
    pub fn new(rect: SurfaceRect) -> Self {
        Self { rect }
    }
}

impl SurfaceProbe for FixedSurface {
    fn bounding_rect(&self) -> SurfaceRect {
        self.rect
    }
}

/// A surface whose rect can be moved while a session runs, for tests
/// and simulations of layout shift.
#[derive(Debug, Clone)]
pub struct SharedSurface {
    rect: Arc<Mutex<SurfaceRect>>,
}

impl SharedSurface {
    pub fn new(rect: SurfaceRect) -> Self {
        Self {
            rect: Arc::new(Mutex::new(rect)),
        }
    }

    pub fn set(&self, rect: SurfaceRect) {
        match self.rect.lock() {
            Ok(mut guard) => *guard = rect,
            Err(poisoned) => *poisoned.into_inner() = rect,
        }
    }
}

impl SurfaceProbe for SharedSurface {
    fn bounding_rect(&self) -> SurfaceRect {
        match self.rect.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Plays back a fixed script of raw events, optionally spaced by an
/// interval. Used by tests and the CLI capture simulation.
pub struct ScriptedProvider {
    script: Vec<RawGazeEvent>,
    interval: Duration,
    ready: bool,
    cancel: Option<CancellationToken>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<RawGazeEvent>, interval: Duration) -> Self {
        Self {
            script,
            interval,
            ready: true,
            cancel: None,
        }
    }

    /// A provider that reports itself as not yet loaded.
    pub fn not_ready() -> Self {
        Self {
            script: Vec::new(),
            interval: Duration::ZERO,
            ready: false,
            cancel: None,
        }
    }
}

impl GazeProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn subscribe(&mut self, capacity: usize) -> OculoResult<mpsc::Receiver<RawGazeEvent>> {
        if !self.ready {
            return Err(OculoError::tracking("scripted provider not ready"));
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let script = self.script.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            for event in script {
                if !interval.is_zero() {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                tokio::select! {
                    _ = token.cancelled() => return,
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            // Sender drops here; the receiver sees the stream end.
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_provider_plays_script_and_closes() {
        let events = vec![RawGazeEvent::valid(1.0, 1.0), RawGazeEvent::valid(2.0, 2.0)];
        let mut provider = ScriptedProvider::new(events.clone(), Duration::ZERO);
        let mut rx = provider.subscribe(8).unwrap();

        assert_eq!(rx.recv().await, Some(events[0]));
        assert_eq!(rx.recv().await, Some(events[1]));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn scripted_provider_stop_ends_stream() {
        let events: Vec<RawGazeEvent> =
            (0..100).map(|i| RawGazeEvent::valid(i as f64, 0.0)).collect();
        let mut provider = ScriptedProvider::new(events, Duration::from_millis(50));
        let mut rx = provider.subscribe(8).unwrap();

        provider.stop();

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert!(received < 100);
    }

    #[test]
    fn not_ready_provider_refuses_subscription() {
        let mut provider = ScriptedProvider::not_ready();
        assert!(!provider.is_ready());
    }

    #[test]
    fn shared_surface_moves() {
        let surface = SharedSurface::new(SurfaceRect::from_size(100.0, 100.0));
        assert_eq!(surface.bounding_rect().width, 100.0);
        surface.set(SurfaceRect::new(5.0, 5.0, 50.0, 50.0));
        assert_eq!(surface.bounding_rect().left, 5.0);
    }
}
