//! Oculo Gaze Tracker
//!
//! Collects timestamped gaze samples during a bounded tracking session
//! bound to one question/image. The tracking provider is an external
//! collaborator modeled as a pluggable source pushing raw events into a
//! bounded channel:
//!
//! - **Provider:** the raw-event source and the surface-rect probe
//! - **Mapper:** viewport-to-image coordinate translation and rejection
//! - **Buffer:** the session-scoped append-only sample store
//! - **Session:** the Idle/Active/Stopped state machine that owns them
//!
//! Exactly one session may be active per process; the controller
//! enforces that, not the storage service.

pub mod buffer;
pub mod mapper;
pub mod provider;
pub mod session;

pub use buffer::SampleBuffer;
pub use provider::{FixedSurface, GazeProvider, ScriptedProvider, SharedSurface, SurfaceProbe};
pub use session::{NullSink, SampleSink, SessionConfig, SessionController, SessionOutcome, SessionState};
