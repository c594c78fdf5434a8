//! Oculo Survey Model
//!
//! Defines the core data contracts for the platform:
//! - **Gaze:** Raw provider events, mapped samples, surface geometry, and
//!   the wire/storage record shape
//! - **Survey:** Users, surveys, questions, responses, and assignments
//!
//! Gaze coordinates are image-local pixels at capture time; the surface
//! dimensions recorded alongside them allow proportional rescaling when
//! the reviewing surface differs from the capture surface.

pub mod gaze;
pub mod survey;

pub use gaze::*;
pub use survey::*;
