//! End-to-end: a tracking session flushes through the gateway into a
//! live service instance, and a reviewer fetch reconstructs it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oculo_common::config::ServerConfig;
use oculo_gaze_tracker::provider::{FixedSurface, ScriptedProvider};
use oculo_gaze_tracker::session::{SessionConfig, SessionController};
use oculo_heatmap_core::aggregate::aggregate;
use oculo_server::db::Database;
use oculo_server::state::AppState;
use oculo_storage_gateway::{GazeGateway, SurveyClient};
use oculo_survey_model::gaze::{
    RawGazeEvent, SessionContext, SessionKey, SurfaceRect,
};
use oculo_survey_model::survey::{
    NewAssignment, NewQuestion, NewResponse, NewSurvey, NewUser, QuestionKind, Role,
};

/// Bind the service on an ephemeral port; returns its base URL.
async fn spawn_service(tag: &str) -> (String, PathBuf) {
    let dir = std::env::temp_dir().join(format!("oculo_e2e_{}_{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let database_path = dir.join("service.db");
    let db = Database::new(database_path.clone()).unwrap();
    let state = AppState::with_database(
        db,
        ServerConfig {
            port: 0,
            database_path,
        },
    );

    let app = oculo_server::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), dir)
}

/// Seed admin, respondent, survey, and one image question; returns the
/// session key.
async fn seed(client: &SurveyClient) -> SessionKey {
    let admin = client
        .login(&NewUser {
            username: "dr-reyes".to_string(),
            role: Role::Admin,
        })
        .await
        .unwrap();
    let respondent = client
        .login(&NewUser {
            username: "dr-okafor".to_string(),
            role: Role::Respondent,
        })
        .await
        .unwrap();

    let survey = client
        .create_survey(&NewSurvey {
            title: "Dermoscopy batch 7".to_string(),
            description: "Lesion assessment".to_string(),
            created_by: admin.id,
        })
        .await
        .unwrap();
    let question = client
        .create_question(&NewQuestion {
            survey_id: survey.id,
            question_text: "Is this lesion malignant?".to_string(),
            question_type: QuestionKind::Image,
            options: None,
            image_url: Some("https://archive.example/lesion-7.jpg".to_string()),
        })
        .await
        .unwrap();
    client
        .assign_survey(&NewAssignment {
            survey_id: survey.id,
            user_id: respondent.id,
        })
        .await
        .unwrap();

    SessionKey::new(survey.id, respondent.id, question.id)
}

#[tokio::test]
async fn session_flush_then_fetch_roundtrip() {
    let (base_url, dir) = spawn_service("roundtrip").await;
    let client = SurveyClient::new(base_url.clone());
    let key = seed(&client).await;

    // Surface at (10, 10), 200x150. Two in-bounds fixations, one
    // provider-invalid event, one out-of-bounds event.
    let script = vec![
        RawGazeEvent::valid(110.0, 85.0),  // -> (100, 75)
        RawGazeEvent::new(50.0, 50.0, 1),  // invalid state, dropped
        RawGazeEvent::valid(60.0, 40.0),   // -> (50, 30)
        RawGazeEvent::valid(500.0, 40.0),  // out of bounds, dropped
    ];
    let surface = Arc::new(FixedSurface::new(SurfaceRect::new(10.0, 10.0, 200.0, 150.0)));
    let gateway = Arc::new(GazeGateway::new(base_url.clone()));
    let controller = SessionController::new(SessionConfig::default(), gateway.clone());

    let ctx = SessionContext::new(key, 200, 150);
    let started = controller
        .start(ctx, Box::new(ScriptedProvider::new(script, Duration::ZERO)), surface)
        .await
        .unwrap();
    assert!(started);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let outcome = controller.stop().await.unwrap().expect("active session");
    assert_eq!(outcome.samples.len(), 2);
    assert_eq!(outcome.flushed, 2);

    // The reviewer fetch returns exactly what was flushed.
    let stored = gateway.fetch(&key).await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].gaze_x, 100.0);
    assert_eq!(stored[0].gaze_y, 75.0);
    assert_eq!(stored[0].image_width, 200);
    assert_eq!(stored[0].image_height, 150);
    assert_eq!(stored[1].gaze_x, 50.0);

    // A reviewer window twice the size rescales proportionally.
    let scaled = stored[0].rescale(400.0, 300.0);
    assert_eq!(scaled.x, 200.0);
    assert_eq!(scaled.y, 150.0);

    // And the fetched sequence aggregates like the captured one.
    let rescaled: Vec<_> = stored.iter().map(|r| r.rescale(200.0, 150.0)).collect();
    let map = aggregate(&rescaled);
    assert_eq!(map.max(), outcome.frequency.max());

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn fetch_unknown_key_is_empty() {
    let (base_url, dir) = spawn_service("empty").await;
    let gateway = GazeGateway::new(base_url);

    let records = gateway.fetch(&SessionKey::new(77, 77, 77)).await;
    assert!(records.is_empty());

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn double_submission_is_rejected() {
    let (base_url, dir) = spawn_service("double").await;
    let client = SurveyClient::new(base_url);
    let key = seed(&client).await;

    let response = NewResponse {
        survey_id: key.survey_id,
        user_id: key.user_id,
        question_id: key.question_id,
        response_text: "Benign".to_string(),
    };
    client.submit_response(&response).await.unwrap();

    let second = client.submit_response(&response).await;
    let err = second.expect_err("resubmission must be rejected");
    assert!(err.to_string().contains("already submitted"));

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn validation_errors_surface_service_messages() {
    let (base_url, dir) = spawn_service("validation").await;
    let client = SurveyClient::new(base_url);

    // Survey referencing a missing creator.
    let err = client
        .create_survey(&NewSurvey {
            title: "Orphan".to_string(),
            description: "No creator".to_string(),
            created_by: 404,
        })
        .await
        .expect_err("creator must exist");
    assert!(err.to_string().contains("User ID does not exist."));

    // Assignment to a non-respondent.
    let admin = client
        .login(&NewUser {
            username: "dr-solo".to_string(),
            role: Role::Admin,
        })
        .await
        .unwrap();
    let survey = client
        .create_survey(&NewSurvey {
            title: "Batch".to_string(),
            description: "d".to_string(),
            created_by: admin.id,
        })
        .await
        .unwrap();
    let err = client
        .assign_survey(&NewAssignment {
            survey_id: survey.id,
            user_id: admin.id,
        })
        .await
        .expect_err("admins cannot take surveys");
    assert!(err.to_string().contains("not a respondent"));

    std::fs::remove_dir_all(dir).ok();
}
