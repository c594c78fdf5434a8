//! Session-scoped sample buffer.

use std::sync::{Arc, Mutex, MutexGuard};

use oculo_survey_model::gaze::GazeSample;

/// Append-only buffer for exactly one tracking session.
///
/// Clones share the same storage, so the capture worker appends through
/// one handle while the stop path snapshots through another. The lock
/// keeps `append` and `snapshot`/`clear` mutually exclusive; a late
/// gaze event can otherwise race the stop sequence.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Arc<Mutex<Vec<GazeSample>>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<GazeSample>> {
        match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append a mapped sample in arrival order.
    pub fn append(&self, sample: GazeSample) {
        self.guard().push(sample);
    }

    /// An owned copy of the buffered sequence, never a live reference;
    /// callers may sort or iterate while capture continues.
    pub fn snapshot(&self) -> Vec<GazeSample> {
        self.guard().clone()
    }

    /// Reset to empty; called after a successful flush.
    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: i64) -> GazeSample {
        GazeSample::new(t as f64, 0.0, t)
    }

    #[test]
    fn append_preserves_arrival_order() {
        let buffer = SampleBuffer::new();
        buffer.append(sample(3));
        buffer.append(sample(1));
        buffer.append(sample(2));

        let ts: Vec<i64> = buffer.snapshot().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(ts, vec![3, 1, 2]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let buffer = SampleBuffer::new();
        buffer.append(sample(1));

        let snap = buffer.snapshot();
        buffer.append(sample(2));
        assert_eq!(snap.len(), 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn clear_resets() {
        let buffer = SampleBuffer::new();
        buffer.append(sample(1));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let a = SampleBuffer::new();
        let b = a.clone();
        a.append(sample(1));
        assert_eq!(b.len(), 1);
    }
}
