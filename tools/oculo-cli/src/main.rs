//! Oculo CLI — Command-line interface for the survey storage service
//! and the gaze pipeline.
//!
//! Usage:
//!   oculo serve [OPTIONS]       Run the storage service
//!   oculo seed [OPTIONS]        Seed a demo survey with an image question
//!   oculo capture [OPTIONS]     Run a simulated tracking session
//!   oculo replay [OPTIONS]      Replay a stored session as a terminal heatmap
//!   oculo stats [OPTIONS]       Print frequency statistics for a stored session

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "oculo",
    about = "Clinical survey platform with gaze-tracking capture",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the storage service
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "5050")]
        port: u16,

        /// SQLite database file (defaults to the data directory)
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Seed a demo survey with one image question and an assignment
    Seed {
        /// Storage service base URL
        #[arg(long, default_value = "http://localhost:5050")]
        base_url: String,

        /// Admin account name
        #[arg(long, default_value = "demo-admin")]
        admin: String,

        /// Respondent account name
        #[arg(long, default_value = "demo-respondent")]
        respondent: String,

        /// Image URL for the diagnostic question
        #[arg(long, default_value = "https://archive.example/lesion-1.jpg")]
        image_url: String,
    },

    /// Run a simulated tracking session and flush it to storage
    Capture {
        /// Storage service base URL
        #[arg(long, default_value = "http://localhost:5050")]
        base_url: String,

        /// Survey id
        #[arg(long)]
        survey: i64,

        /// Respondent user id
        #[arg(long)]
        user: i64,

        /// Question id
        #[arg(long)]
        question: i64,

        /// Tracked surface width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Tracked surface height in pixels
        #[arg(long, default_value = "480")]
        height: u32,

        /// Number of synthetic gaze events to generate
        #[arg(long, default_value = "120")]
        samples: usize,

        /// Milliseconds between synthetic events
        #[arg(long, default_value = "10")]
        event_interval_ms: u64,
    },

    /// Fetch a stored session and replay it as a terminal heatmap
    Replay {
        /// Storage service base URL
        #[arg(long, default_value = "http://localhost:5050")]
        base_url: String,

        /// Survey id
        #[arg(long)]
        survey: i64,

        /// Respondent user id
        #[arg(long)]
        user: i64,

        /// Question id
        #[arg(long)]
        question: i64,

        /// Viewing surface width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Viewing surface height in pixels
        #[arg(long, default_value = "480")]
        height: u32,

        /// Milliseconds between replayed samples
        #[arg(long, default_value = "100")]
        cadence_ms: u64,
    },

    /// Print frequency statistics for a stored session
    Stats {
        /// Storage service base URL
        #[arg(long, default_value = "http://localhost:5050")]
        base_url: String,

        /// Survey id
        #[arg(long)]
        survey: i64,

        /// Respondent user id
        #[arg(long)]
        user: i64,

        /// Question id
        #[arg(long)]
        question: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    oculo_common::logging::init_logging(&oculo_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Serve { port, database } => commands::serve::run(port, database).await,
        Commands::Seed {
            base_url,
            admin,
            respondent,
            image_url,
        } => commands::seed::run(base_url, admin, respondent, image_url).await,
        Commands::Capture {
            base_url,
            survey,
            user,
            question,
            width,
            height,
            samples,
            event_interval_ms,
        } => {
            commands::capture::run(
                base_url,
                survey,
                user,
                question,
                width,
                height,
                samples,
                event_interval_ms,
            )
            .await
        }
        Commands::Replay {
            base_url,
            survey,
            user,
            question,
            width,
            height,
            cadence_ms,
        } => {
            commands::replay::run(base_url, survey, user, question, width, height, cadence_ms)
                .await
        }
        Commands::Stats {
            base_url,
            survey,
            user,
            question,
        } => commands::stats::run(base_url, survey, user, question).await,
    }
}
