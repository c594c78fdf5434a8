//! Run a simulated tracking session against a live storage service.
//!
//! Generates a deterministic fixation pattern (three dwell clusters with
//! small oscillations, the shape real gaze traces tend toward), runs it
//! through the full pipeline, and flushes to storage.

use std::sync::Arc;
use std::time::Duration;

use oculo_gaze_tracker::provider::{FixedSurface, ScriptedProvider};
use oculo_gaze_tracker::session::{SessionConfig, SessionController};
use oculo_storage_gateway::GazeGateway;
use oculo_survey_model::gaze::{RawGazeEvent, SessionContext, SessionKey, SurfaceRect};

/// Synthetic gaze script over a `width`x`height` surface. A handful of
/// events land outside the surface or carry an invalid state, the way a
/// real provider misbehaves.
fn synthetic_script(width: u32, height: u32, count: usize) -> Vec<RawGazeEvent> {
    let (w, h) = (width as f64, height as f64);
    let centers = [(0.30, 0.40), (0.62, 0.35), (0.48, 0.70)];

    (0..count)
        .map(|i| {
            let phase = i as f64;
            let (cx, cy) = centers[(i * centers.len()) / count.max(1)];
            let x = cx * w + (phase * 0.7).sin() * w * 0.04;
            let y = cy * h + (phase * 1.1).cos() * h * 0.04;

            if i % 23 == 7 {
                // Provider hiccup: invalid state
                RawGazeEvent::new(x, y, 1)
            } else if i % 31 == 11 {
                // Glance off-surface
                RawGazeEvent::valid(w * 1.5, y)
            } else {
                RawGazeEvent::valid(x, y)
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    base_url: String,
    survey: i64,
    user: i64,
    question: i64,
    width: u32,
    height: u32,
    samples: usize,
    event_interval_ms: u64,
) -> anyhow::Result<()> {
    let key = SessionKey::new(survey, user, question);
    let ctx = SessionContext::new(key, width, height);

    let script = synthetic_script(width, height, samples);
    let provider = Box::new(ScriptedProvider::new(
        script,
        Duration::from_millis(event_interval_ms),
    ));
    // The simulated surface sits at the viewport origin.
    let surface = Arc::new(FixedSurface::new(SurfaceRect::from_size(
        width as f64,
        height as f64,
    )));

    let gateway = Arc::new(GazeGateway::new(base_url));
    let controller = SessionController::new(SessionConfig::default(), gateway);

    if !controller.start(ctx, provider, surface).await? {
        anyhow::bail!("tracking session did not start");
    }

    // Wait for the script to play out, then stop.
    let play_time = Duration::from_millis(event_interval_ms * samples as u64 + 200);
    tokio::time::sleep(play_time).await;

    let outcome = controller
        .stop()
        .await?
        .ok_or_else(|| anyhow::anyhow!("session was not active at stop"))?;

    println!(
        "Captured {} samples ({} flushed) for survey {survey}, user {user}, question {question}",
        outcome.samples.len(),
        outcome.flushed,
    );
    println!(
        "Hottest pixel visited {} times across {} distinct pixels",
        outcome.frequency.max(),
        outcome.frequency.len(),
    );

    Ok(())
}
