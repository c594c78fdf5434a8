//! Oculo Heatmap Core
//!
//! Turns a session's gaze samples into visual density data:
//! - **Aggregate:** Per-pixel visit counts and the running maximum
//! - **Surface:** The render profile and intensity-grid surface
//! - **Replay:** Fixed-cadence temporal reconstruction of a sample
//!   sequence
//!
//! Aggregation is pure computation; replay drives a surface over time but
//! never touches stored data.

pub mod aggregate;
pub mod replay;
pub mod surface;

pub use aggregate::{aggregate, FrequencyMap};
pub use replay::{HeatmapReplayer, Replay};
pub use surface::{HeatmapSurface, IntensityGrid, RenderProfile};
