//! Frequency aggregation: reduce a sample sequence to per-pixel visit
//! counts.

use std::collections::HashMap;

use oculo_survey_model::gaze::GazeSample;

/// Per-pixel visit counts with the running maximum.
///
/// Derived data, never persisted; recomputed from the sample sequence
/// whenever a heatmap must be rendered.
#[derive(Debug, Clone, Default)]
pub struct FrequencyMap {
    cells: HashMap<(i64, i64), u32>,
    max: u32,
}

/// Count visits per rounded pixel.
///
/// Each sample's `(x, y)` is rounded to the nearest integer pixel and
/// used as the grouping key. The result is independent of input order;
/// only replay cares about time.
pub fn aggregate(samples: &[GazeSample]) -> FrequencyMap {
    let mut cells: HashMap<(i64, i64), u32> = HashMap::new();
    let mut max = 0u32;

    for sample in samples {
        let key = (sample.x.round() as i64, sample.y.round() as i64);
        let count = cells.entry(key).or_insert(0);
        *count += 1;
        max = max.max(*count);
    }

    FrequencyMap { cells, max }
}

impl FrequencyMap {
    /// The highest visit count across all cells; `0` for an empty map.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Visit count at a rounded pixel.
    pub fn count_at(&self, x: i64, y: i64) -> u32 {
        self.cells.get(&(x, y)).copied().unwrap_or(0)
    }

    /// Number of distinct visited pixels.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Count at a pixel normalized against the maximum. An empty map
    /// yields `0.0` for every pixel rather than dividing by zero.
    pub fn normalized_at(&self, x: i64, y: i64) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        self.count_at(x, y) as f64 / self.max as f64
    }

    /// Cells in deterministic row-major order, for rendering and
    /// comparison.
    pub fn sorted_cells(&self) -> Vec<((i64, i64), u32)> {
        let mut cells: Vec<_> = self.cells.iter().map(|(k, v)| (*k, *v)).collect();
        cells.sort_by_key(|((x, y), _)| (*y, *x));
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(x: f64, y: f64, t: i64) -> GazeSample {
        GazeSample::new(x, y, t)
    }

    #[test]
    fn aggregate_counts_repeat_visits() {
        let samples = vec![
            sample(5.0, 5.0, 0),
            sample(5.2, 4.8, 10),
            sample(4.9, 5.1, 20),
            sample(50.0, 50.0, 30),
            sample(50.0, 50.0, 40),
        ];

        let map = aggregate(&samples);
        assert_eq!(map.count_at(5, 5), 3);
        assert_eq!(map.count_at(50, 50), 2);
        assert_eq!(map.max(), 3);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn aggregate_empty_is_zeroed() {
        let map = aggregate(&[]);
        assert_eq!(map.max(), 0);
        assert!(map.is_empty());
        assert_eq!(map.normalized_at(0, 0), 0.0);
    }

    #[test]
    fn normalization_never_exceeds_one() {
        let samples = vec![sample(1.0, 1.0, 0), sample(1.0, 1.0, 1), sample(2.0, 2.0, 2)];
        let map = aggregate(&samples);
        assert_eq!(map.normalized_at(1, 1), 1.0);
        assert_eq!(map.normalized_at(2, 2), 0.5);
        assert_eq!(map.normalized_at(9, 9), 0.0);
    }

    #[test]
    fn rounding_groups_neighbors() {
        // 10.4 and 9.6 both round to 10
        let samples = vec![sample(10.4, 0.0, 0), sample(9.6, 0.0, 1)];
        let map = aggregate(&samples);
        assert_eq!(map.count_at(10, 0), 2);
    }

    proptest! {
        #[test]
        fn aggregate_is_order_independent(
            points in prop::collection::vec((0u16..200, 0u16..200, 0i64..10_000), 0..64),
            seed in any::<u64>(),
        ) {
            let samples: Vec<GazeSample> = points
                .iter()
                .map(|(x, y, t)| sample(*x as f64, *y as f64, *t))
                .collect();

            // Deterministic pseudo-shuffle driven by the seed
            let mut shuffled = samples.clone();
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            let a = aggregate(&samples);
            let b = aggregate(&shuffled);
            prop_assert_eq!(a.max(), b.max());
            prop_assert_eq!(a.sorted_cells(), b.sorted_cells());
        }
    }
}
