//! Coordinate mapping from provider viewport space to image-local
//! pixels.

use oculo_survey_model::gaze::{GazeSample, RawGazeEvent, SurfaceRect, TimestampMs};

/// Translate a raw gaze event into the surface's local pixel space.
///
/// Returns `None` — the sample is silently dropped, not an error — when
/// the provider marked the event invalid, the surface has no layout yet
/// (zero-size rect), or the translated point falls outside the surface.
/// Pure computation; buffering is the caller's job.
pub fn map_raw_event(
    raw: &RawGazeEvent,
    rect: &SurfaceRect,
    timestamp_ms: TimestampMs,
) -> Option<GazeSample> {
    if !raw.is_valid() || rect.is_empty() {
        return None;
    }

    let x = raw.raw_x - rect.left;
    let y = raw.raw_y - rect.top;
    if !rect.contains_local(x, y) {
        return None;
    }

    Some(GazeSample::new(x, y, timestamp_ms))
}
