//! Oculo Storage Service
//!
//! REST endpoints for users, surveys, questions, responses, assignments,
//! and raw gaze samples, backed by SQLite. JSON in, JSON out; errors are
//! `{ "error": ... }` bodies.
//!
//! Route naming quirk: gaze samples are created at `POST /gaze-data` but
//! listed at `GET /gaze_data`. Clients depend on both spellings, so both
//! are part of the contract.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

pub mod db;
pub mod error;
pub mod routes;
pub mod state;

use oculo_common::config::ServerConfig;
use state::AppState;

/// Build the service router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/users", post(routes::create_user).get(routes::list_users))
        .route(
            "/surveys",
            post(routes::create_survey).get(routes::list_surveys),
        )
        .route(
            "/surveys/:survey_id",
            get(routes::get_survey).delete(routes::delete_survey),
        )
        .route("/surveys/:survey_id/questions", get(routes::questions_for_survey))
        .route("/surveys/:survey_id/responses", get(routes::grouped_responses))
        .route("/questions", post(routes::create_question))
        .route(
            "/responses",
            post(routes::create_response).get(routes::list_responses),
        )
        .route("/survey-assignments", post(routes::create_assignment))
        .route(
            "/survey-assignments/:user_id",
            get(routes::assignments_for_user),
        )
        .route("/gaze-data", post(routes::create_gaze))
        .route("/gaze_data", get(routes::list_gaze))
        .layer(cors)
        .with_state(state)
}

/// Start the service and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(database = %config.database_path.display(), "Initializing state");
    let state = AppState::new(config.clone())?;

    let app = router(state);
    let address = format!("0.0.0.0:{}", config.port);
    tracing::info!(%address, "Binding storage service");

    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, "Storage service running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Storage service shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        } else {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
