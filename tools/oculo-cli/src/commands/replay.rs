//! Fetch a stored session and replay it as a terminal heatmap.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use oculo_heatmap_core::aggregate::aggregate;
use oculo_heatmap_core::replay::{HeatmapReplayer, SharedSurface};
use oculo_heatmap_core::surface::{IntensityGrid, RenderProfile};
use oculo_storage_gateway::GazeGateway;
use oculo_survey_model::gaze::SessionKey;

const GLYPHS: &[u8] = b" .:-=+*#%@";
const TERMINAL_COLS: u32 = 72;
const TERMINAL_ROWS: u32 = 24;

/// Downsample the grid to terminal cells, taking the hottest pixel per
/// cell.
fn render_ascii(grid: &IntensityGrid, cols: u32, rows: u32) -> String {
    let mut out = String::new();
    let cell_w = (grid.width() as f64 / cols as f64).max(1.0);
    let cell_h = (grid.height() as f64 / rows as f64).max(1.0);

    for row in 0..rows {
        for col in 0..cols {
            let x0 = (col as f64 * cell_w) as u32;
            let y0 = (row as f64 * cell_h) as u32;
            let x1 = (((col + 1) as f64 * cell_w) as u32).min(grid.width());
            let y1 = (((row + 1) as f64 * cell_h) as u32).min(grid.height());

            let mut hottest: f64 = 0.0;
            for y in y0..y1 {
                for x in x0..x1 {
                    hottest = hottest.max(grid.normalized_at(x, y));
                }
            }

            let idx = (hottest * (GLYPHS.len() - 1) as f64).round() as usize;
            out.push(GLYPHS[idx.min(GLYPHS.len() - 1)] as char);
        }
        out.push('\n');
    }
    out
}

pub async fn run(
    base_url: String,
    survey: i64,
    user: i64,
    question: i64,
    width: u32,
    height: u32,
    cadence_ms: u64,
) -> anyhow::Result<()> {
    let key = SessionKey::new(survey, user, question);
    let gateway = GazeGateway::new(base_url);

    let records = gateway.fetch(&key).await;
    if records.is_empty() {
        println!("No gaze data stored for survey {survey}, user {user}, question {question}.");
        return Ok(());
    }

    // Rescale stored capture-time coordinates onto the viewing surface.
    let samples: Vec<_> = records
        .iter()
        .map(|r| r.rescale(width as f64, height as f64))
        .collect();
    let frequency = aggregate(&samples);

    println!(
        "Replaying {} gaze points at {cadence_ms}ms per point (hottest pixel: {} visits)...",
        samples.len(),
        frequency.max(),
    );

    let grid = Arc::new(Mutex::new(IntensityGrid::new(
        width,
        height,
        RenderProfile::default(),
    )));
    let surface: SharedSurface = grid.clone();

    let mut replayer = HeatmapReplayer::spawn(
        samples,
        frequency.max(),
        surface,
        Duration::from_millis(cadence_ms),
    );
    replayer.finished().await;

    let guard = grid
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    println!();
    print!("{}", render_ascii(&guard, TERMINAL_COLS, TERMINAL_ROWS));

    Ok(())
}
