//! Gaze sample types and surface geometry.
//!
//! A sample travels through three shapes: the provider's [`RawGazeEvent`]
//! in viewport coordinates, the mapped [`GazeSample`] in image-local
//! pixels, and the [`GazeRecord`] wire/storage shape annotated with the
//! capture-time surface dimensions.

use serde::{Deserialize, Serialize};

/// Wall-clock timestamp in epoch milliseconds.
pub type TimestampMs = i64;

/// Provider state value marking a sample as usable.
pub const GAZE_STATE_VALID: i32 = 0;

/// A raw gaze event as delivered by the tracking provider, in viewport
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawGazeEvent {
    /// Provider validity state; `0` means the sample is usable.
    pub state: i32,

    /// Estimated gaze X in viewport pixels.
    #[serde(rename = "GazeX")]
    pub raw_x: f64,

    /// Estimated gaze Y in viewport pixels.
    #[serde(rename = "GazeY")]
    pub raw_y: f64,
}

impl RawGazeEvent {
    pub fn new(raw_x: f64, raw_y: f64, state: i32) -> Self {
        Self { state, raw_x, raw_y }
    }

    /// A valid event (state `0`).
    pub fn valid(raw_x: f64, raw_y: f64) -> Self {
        Self::new(raw_x, raw_y, GAZE_STATE_VALID)
    }

    /// Whether the provider considers this sample usable.
    pub fn is_valid(&self) -> bool {
        self.state == GAZE_STATE_VALID
    }
}

/// One instantaneous gaze reading in image-local pixel space.
///
/// Immutable once recorded; created only by the coordinate mapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    /// X in image-local pixels.
    pub x: f64,
    /// Y in image-local pixels.
    pub y: f64,
    /// Capture time in epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: TimestampMs,
}

impl GazeSample {
    pub fn new(x: f64, y: f64, timestamp_ms: TimestampMs) -> Self {
        Self { x, y, timestamp_ms }
    }
}

/// The current bounding rectangle of the tracked surface, in viewport
/// pixels.
///
/// Layout can shift between samples (scroll, resize), so callers must
/// re-query this per sample rather than caching it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect anchored at the viewport origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// A not-yet-laid-out surface (image still loading) has a zero-size
    /// rect; every sample against it is rejected.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether an image-local point lies on the surface. Edges count as
    /// inside.
    pub fn contains_local(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && x <= self.width && y >= 0.0 && y <= self.height
    }
}

/// The persistence key for one session's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub survey_id: i64,
    pub user_id: i64,
    pub question_id: i64,
}

impl SessionKey {
    pub fn new(survey_id: i64, user_id: i64, question_id: i64) -> Self {
        Self {
            survey_id,
            user_id,
            question_id,
        }
    }
}

/// Session metadata carried alongside every flushed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub key: SessionKey,

    /// Tracked surface width in pixels at capture time.
    pub surface_width: u32,

    /// Tracked surface height in pixels at capture time.
    pub surface_height: u32,
}

impl SessionContext {
    pub fn new(key: SessionKey, surface_width: u32, surface_height: u32) -> Self {
        Self {
            key,
            surface_width,
            surface_height,
        }
    }
}

/// The wire and storage shape of one persisted sample.
///
/// Field names match the storage service's JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeRecord {
    pub user_id: i64,
    pub survey_id: i64,
    pub question_id: i64,
    pub gaze_x: f64,
    pub gaze_y: f64,
    pub timestamp: TimestampMs,
    pub image_width: i64,
    pub image_height: i64,
}

impl GazeRecord {
    /// Build the wire record for one sample of a session.
    pub fn from_sample(ctx: &SessionContext, sample: &GazeSample) -> Self {
        Self {
            user_id: ctx.key.user_id,
            survey_id: ctx.key.survey_id,
            question_id: ctx.key.question_id,
            gaze_x: sample.x,
            gaze_y: sample.y,
            timestamp: sample.timestamp_ms,
            image_width: ctx.surface_width as i64,
            image_height: ctx.surface_height as i64,
        }
    }

    /// The persistence key this record belongs to.
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.survey_id, self.user_id, self.question_id)
    }

    /// Proportionally rescale the stored coordinates onto a viewing
    /// surface of a different size. Storage keeps the raw capture; the
    /// rescale happens at render time only. Records with non-positive
    /// stored dimensions come back unscaled.
    pub fn rescale(&self, view_width: f64, view_height: f64) -> GazeSample {
        if self.image_width <= 0 || self.image_height <= 0 {
            return GazeSample::new(self.gaze_x, self.gaze_y, self.timestamp);
        }
        GazeSample::new(
            self.gaze_x / self.image_width as f64 * view_width,
            self.gaze_y / self.image_height as f64 * view_height,
            self.timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_event_validity() {
        assert!(RawGazeEvent::valid(10.0, 20.0).is_valid());
        assert!(!RawGazeEvent::new(10.0, 20.0, -1).is_valid());
        assert!(!RawGazeEvent::new(10.0, 20.0, 1).is_valid());
    }

    #[test]
    fn test_raw_event_wire_names() {
        let raw: RawGazeEvent =
            serde_json::from_str(r#"{"state":0,"GazeX":12.5,"GazeY":7.0}"#).unwrap();
        assert!(raw.is_valid());
        assert_eq!(raw.raw_x, 12.5);
        assert_eq!(raw.raw_y, 7.0);
    }

    #[test]
    fn test_surface_rect_bounds() {
        let rect = SurfaceRect::new(10.0, 10.0, 100.0, 100.0);
        assert!(rect.contains_local(0.0, 0.0));
        assert!(rect.contains_local(100.0, 100.0));
        assert!(!rect.contains_local(100.1, 50.0));
        assert!(!rect.contains_local(-0.1, 50.0));
    }

    #[test]
    fn test_empty_rect() {
        assert!(SurfaceRect::from_size(0.0, 100.0).is_empty());
        assert!(SurfaceRect::from_size(100.0, 0.0).is_empty());
        assert!(!SurfaceRect::from_size(1.0, 1.0).is_empty());
    }

    #[test]
    fn test_record_wire_format() {
        let ctx = SessionContext::new(SessionKey::new(3, 1, 7), 640, 480);
        let record = GazeRecord::from_sample(&ctx, &GazeSample::new(100.0, 50.0, 1234));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"gaze_x\":100.0"));
        assert!(json.contains("\"image_width\":640"));
        assert!(json.contains("\"timestamp\":1234"));
        assert!(json.contains("\"survey_id\":3"));
    }

    #[test]
    fn test_record_roundtrip() {
        let ctx = SessionContext::new(SessionKey::new(1, 2, 3), 800, 600);
        let record = GazeRecord::from_sample(&ctx, &GazeSample::new(12.0, 34.0, 99));
        let parsed: GazeRecord =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(record, parsed);
        assert_eq!(parsed.key(), SessionKey::new(1, 2, 3));
    }

    #[test]
    fn test_rescale_proportional() {
        let record = GazeRecord {
            user_id: 1,
            survey_id: 1,
            question_id: 1,
            gaze_x: 50.0,
            gaze_y: 30.0,
            timestamp: 0,
            image_width: 100,
            image_height: 60,
        };
        let scaled = record.rescale(200.0, 120.0);
        assert_eq!(scaled.x, 100.0);
        assert_eq!(scaled.y, 60.0);
    }

    #[test]
    fn test_rescale_degenerate_dimensions() {
        let record = GazeRecord {
            user_id: 1,
            survey_id: 1,
            question_id: 1,
            gaze_x: 50.0,
            gaze_y: 30.0,
            timestamp: 0,
            image_width: 0,
            image_height: 0,
        };
        let scaled = record.rescale(200.0, 120.0);
        assert_eq!(scaled.x, 50.0);
        assert_eq!(scaled.y, 30.0);
    }
}
