//! Temporal heatmap replay.
//!
//! Replays a sample sequence onto a surface one point at a time at a
//! fixed cadence, so density patterns emerge progressively instead of
//! all at once. Used both for live capture and for reconstructing a
//! persisted session. Replay never touches stored data; every run starts
//! from a cleared surface.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use oculo_survey_model::gaze::GazeSample;

use crate::surface::HeatmapSurface;

/// A surface shared between the replay task and its owner.
pub type SharedSurface = Arc<Mutex<dyn HeatmapSurface>>;

fn lock_surface(surface: &SharedSurface) -> MutexGuard<'_, dyn HeatmapSurface + 'static> {
    match surface.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A deterministic replay cursor over a time-sorted sample sequence.
///
/// Sorting happens here, defensively, regardless of arrival order.
#[derive(Debug)]
pub struct Replay {
    samples: Vec<GazeSample>,
    max: u32,
    next: usize,
}

impl Replay {
    /// Create a cursor over the samples, sorted by timestamp ascending,
    /// with the known frequency maximum for color seeding.
    pub fn new(mut samples: Vec<GazeSample>, max: u32) -> Self {
        samples.sort_by_key(|s| s.timestamp_ms);
        Self {
            samples,
            max,
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples not yet rendered.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.next
    }

    /// Clear the surface, seed it with the known maximum, and restart
    /// from the first sample.
    pub fn rewind(&mut self, surface: &mut dyn HeatmapSurface) {
        surface.reset(self.max);
        self.next = 0;
    }

    /// Render the next sample. Returns `false` once the sequence is
    /// exhausted.
    pub fn advance(&mut self, surface: &mut dyn HeatmapSurface) -> bool {
        let Some(sample) = self.samples.get(self.next) else {
            return false;
        };
        surface.add_point(sample.x, sample.y);
        self.next += 1;
        true
    }
}

/// Drives a [`Replay`] on a background task at a fixed cadence.
///
/// Dropping the replayer cancels the timer loop, so a torn-down view
/// never keeps rendering into a disposed surface.
pub struct HeatmapReplayer {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HeatmapReplayer {
    /// Start replaying onto the surface, one sample per cadence tick.
    pub fn spawn(
        samples: Vec<GazeSample>,
        max: u32,
        surface: SharedSurface,
        cadence: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut replay = Replay::new(samples, max);

        let task = tokio::spawn(async move {
            {
                let mut guard = lock_surface(&surface);
                replay.rewind(&mut *guard);
            }

            let total = replay.len();
            tracing::debug!(samples = total, "Replay started");

            let mut ticker = tokio::time::interval(cadence.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!(rendered = total - replay.remaining(), "Replay cancelled");
                        return;
                    }
                    _ = ticker.tick() => {
                        let more = {
                            let mut guard = lock_surface(&surface);
                            replay.advance(&mut *guard)
                        };
                        if !more {
                            tracing::debug!(samples = total, "Replay complete");
                            return;
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Cancel the replay loop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the replay task has exited (completed or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Wait for the replay task to exit.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for HeatmapReplayer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every surface call; clones share the same log so the
    /// test keeps a handle while the replay task owns the surface.
    #[derive(Default, Clone)]
    struct RecordingSurface {
        resets: Arc<Mutex<Vec<u32>>>,
        points: Arc<Mutex<Vec<(f64, f64)>>>,
    }

    impl RecordingSurface {
        fn resets(&self) -> Vec<u32> {
            self.resets.lock().unwrap().clone()
        }

        fn points(&self) -> Vec<(f64, f64)> {
            self.points.lock().unwrap().clone()
        }
    }

    impl HeatmapSurface for RecordingSurface {
        fn reset(&mut self, max: u32) {
            self.resets.lock().unwrap().push(max);
            self.points.lock().unwrap().clear();
        }

        fn add_point(&mut self, x: f64, y: f64) {
            self.points.lock().unwrap().push((x, y));
        }
    }

    fn sample(x: f64, t: i64) -> GazeSample {
        GazeSample::new(x, 0.0, t)
    }

    #[test]
    fn replay_sorts_by_timestamp() {
        let mut surface = RecordingSurface::default();
        let mut replay = Replay::new(vec![sample(3.0, 30), sample(1.0, 10), sample(2.0, 20)], 1);
        replay.rewind(&mut surface);
        while replay.advance(&mut surface) {}

        let xs: Vec<f64> = surface.points().iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn replay_is_idempotent_across_runs() {
        let mut surface = RecordingSurface::default();
        let mut replay = Replay::new(vec![sample(1.0, 0), sample(2.0, 1)], 2);

        replay.rewind(&mut surface);
        while replay.advance(&mut surface) {}
        let first = surface.points();

        replay.rewind(&mut surface);
        while replay.advance(&mut surface) {}

        assert_eq!(surface.points(), first);
        assert_eq!(surface.resets(), vec![2, 2]);
    }

    #[test]
    fn advance_on_empty_is_false() {
        let mut surface = RecordingSurface::default();
        let mut replay = Replay::new(vec![], 0);
        replay.rewind(&mut surface);
        assert!(!replay.advance(&mut surface));
        assert_eq!(surface.resets(), vec![0]);
        assert!(surface.points().is_empty());
    }

    #[tokio::test]
    async fn spawned_replay_renders_everything() {
        let recorder = RecordingSurface::default();
        let surface: SharedSurface = Arc::new(Mutex::new(recorder.clone()));
        let samples = vec![sample(2.0, 1), sample(1.0, 0), sample(3.0, 2)];

        let mut replayer =
            HeatmapReplayer::spawn(samples, 2, surface, Duration::from_millis(1));
        replayer.finished().await;

        assert!(replayer.is_finished());
        assert_eq!(recorder.resets(), vec![2]);
        let xs: Vec<f64> = recorder.points().iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn cancel_stops_mid_replay() {
        let recorder = RecordingSurface::default();
        let surface: SharedSurface = Arc::new(Mutex::new(recorder.clone()));
        let samples: Vec<GazeSample> = (0..50).map(|i| sample(i as f64, i)).collect();

        let mut replayer =
            HeatmapReplayer::spawn(samples, 1, surface, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;
        replayer.cancel();
        replayer.finished().await;

        assert!(replayer.is_finished());
        let rendered = recorder.points().len();
        assert!(rendered < 50, "cancel should stop the loop early, got {rendered}");
    }
}
