//! Print frequency statistics for a stored session.

use oculo_heatmap_core::aggregate::aggregate;
use oculo_storage_gateway::GazeGateway;
use oculo_survey_model::gaze::{GazeSample, SessionKey};

pub async fn run(base_url: String, survey: i64, user: i64, question: i64) -> anyhow::Result<()> {
    let key = SessionKey::new(survey, user, question);
    let gateway = GazeGateway::new(base_url);

    let records = gateway.fetch(&key).await;
    if records.is_empty() {
        println!("No gaze data stored for survey {survey}, user {user}, question {question}.");
        return Ok(());
    }

    // Statistics run in raw capture-time coordinates.
    let samples: Vec<GazeSample> = records
        .iter()
        .map(|r| GazeSample::new(r.gaze_x, r.gaze_y, r.timestamp))
        .collect();
    let frequency = aggregate(&samples);

    let first = samples.iter().map(|s| s.timestamp_ms).min().unwrap_or(0);
    let last = samples.iter().map(|s| s.timestamp_ms).max().unwrap_or(0);

    println!("Session ({survey}, {user}, {question}):");
    println!("  samples          {}", samples.len());
    println!("  distinct pixels  {}", frequency.len());
    println!("  hottest visits   {}", frequency.max());
    println!("  span             {:.1}s", (last - first) as f64 / 1000.0);
    println!(
        "  capture surface  {}x{}",
        records[0].image_width, records[0].image_height
    );

    let mut cells = frequency.sorted_cells();
    cells.sort_by(|a, b| b.1.cmp(&a.1));
    println!("  top fixations:");
    for ((x, y), count) in cells.into_iter().take(5) {
        println!("    ({x:>4}, {y:>4})  {count} visits");
    }

    Ok(())
}
