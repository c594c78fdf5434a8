//! Request handlers.
//!
//! Validation mirrors the service contract: referenced rows are checked
//! before insert and missing references answer 400, except assignment
//! targets which answer 404. Every error body is `{ "error": ... }`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use oculo_survey_model::gaze::{GazeRecord, SessionKey};
use oculo_survey_model::survey::{
    NewAssignment, NewQuestion, NewResponse, NewSurvey, NewUser, Role, Survey,
};

use crate::error::AppError;
use crate::state::AppState;

type SharedState = Arc<AppState>;

// Users

pub async fn create_user(
    State(state): State<SharedState>,
    Json(payload): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::bad_request("Username and role are required."));
    }

    let user = state
        .db
        .login_or_create_user(&payload)
        .await
        .map_err(|e| AppError::internal("Server error while creating or logging in user.", e))?;
    Ok(Json(user))
}

pub async fn list_users(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let users = state
        .db
        .list_users()
        .await
        .map_err(|e| AppError::internal("Server error while fetching users.", e))?;
    Ok(Json(users))
}

// Surveys

pub async fn create_survey(
    State(state): State<SharedState>,
    Json(payload): Json<NewSurvey>,
) -> Result<impl IntoResponse, AppError> {
    let creator = state
        .db
        .get_user(payload.created_by)
        .await
        .map_err(|e| AppError::internal("Server error while creating survey.", e))?;
    if creator.is_none() {
        return Err(AppError::bad_request("User ID does not exist."));
    }

    let survey = state
        .db
        .create_survey(&payload)
        .await
        .map_err(|e| AppError::internal("Server error while creating survey.", e))?;
    Ok(Json(survey))
}

pub async fn get_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = state
        .db
        .get_survey(survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching surveys.", e))?
        .ok_or_else(|| AppError::bad_request("Survey ID does not exist."))?;
    Ok(Json(survey))
}

pub async fn list_surveys(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let surveys = state
        .db
        .list_surveys()
        .await
        .map_err(|e| AppError::internal("Server error while fetching surveys.", e))?;
    Ok(Json(surveys))
}

#[derive(Debug, Serialize)]
pub struct DeletedSurvey {
    pub message: String,
    pub deleted_survey: Survey,
}

pub async fn delete_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .db
        .delete_survey(survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while deleting survey.", e))?
        .ok_or_else(|| AppError::not_found("Survey not found."))?;

    Ok(Json(DeletedSurvey {
        message: "Survey successfully deleted".to_string(),
        deleted_survey: deleted,
    }))
}

// Questions

pub async fn create_question(
    State(state): State<SharedState>,
    Json(payload): Json<NewQuestion>,
) -> Result<impl IntoResponse, AppError> {
    let survey = state
        .db
        .get_survey(payload.survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while creating question.", e))?;
    if survey.is_none() {
        return Err(AppError::bad_request("Survey ID does not exist."));
    }

    let question = state
        .db
        .create_question(&payload)
        .await
        .map_err(|e| AppError::internal("Server error while creating question.", e))?;
    Ok(Json(question))
}

pub async fn questions_for_survey(
    State(state): State<SharedState>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = state
        .db
        .get_survey(survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching questions.", e))?;
    if survey.is_none() {
        return Err(AppError::bad_request("Survey ID does not exist."));
    }

    let questions = state
        .db
        .questions_for_survey(survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching questions.", e))?;
    if questions.is_empty() {
        return Err(AppError::not_found("No questions found for this survey."));
    }
    Ok(Json(questions))
}

// Responses

pub async fn create_response(
    State(state): State<SharedState>,
    Json(payload): Json<NewResponse>,
) -> Result<impl IntoResponse, AppError> {
    let internal = |e| AppError::internal("Server error while submitting response.", e);

    if state.db.get_survey(payload.survey_id).await.map_err(internal)?.is_none() {
        return Err(AppError::bad_request("Survey ID does not exist."));
    }
    if state.db.get_user(payload.user_id).await.map_err(internal)?.is_none() {
        return Err(AppError::bad_request("User ID does not exist."));
    }
    if state.db.get_question(payload.question_id).await.map_err(internal)?.is_none() {
        return Err(AppError::bad_request("Question ID does not exist."));
    }

    // One answer per user per question; resubmission is a user-facing
    // conflict, not a silent overwrite.
    let already = state
        .db
        .has_response(payload.survey_id, payload.user_id, payload.question_id)
        .await
        .map_err(internal)?;
    if already {
        return Err(AppError::conflict(
            "Response already submitted for this question.",
        ));
    }

    let response = state.db.create_response(&payload).await.map_err(internal)?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ResponsesQuery {
    pub survey_id: i64,
    pub user_id: Option<i64>,
}

pub async fn list_responses(
    State(state): State<SharedState>,
    Query(query): Query<ResponsesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let survey = state
        .db
        .get_survey(query.survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching responses.", e))?;
    if survey.is_none() {
        return Err(AppError::bad_request("Survey ID does not exist."));
    }

    let responses = state
        .db
        .responses_filtered(query.survey_id, query.user_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching responses.", e))?;
    Ok(Json(responses))
}

pub async fn grouped_responses(
    State(state): State<SharedState>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = state
        .db
        .get_survey(survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching survey responses.", e))?;
    if survey.is_none() {
        return Err(AppError::bad_request("Survey ID does not exist."));
    }

    let grouped = state
        .db
        .grouped_responses(survey_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching survey responses.", e))?;
    if grouped.is_empty() {
        return Err(AppError::not_found("No responses found for this survey."));
    }
    Ok(Json(grouped))
}

// Assignments

pub async fn create_assignment(
    State(state): State<SharedState>,
    Json(payload): Json<NewAssignment>,
) -> Result<impl IntoResponse, AppError> {
    let internal = |e| AppError::internal("Server error while assigning survey.", e);

    if state.db.get_survey(payload.survey_id).await.map_err(internal)?.is_none() {
        return Err(AppError::not_found("Survey not found."));
    }

    let respondent = state
        .db
        .get_user(payload.user_id)
        .await
        .map_err(internal)?
        .filter(|user| user.role == Role::Respondent);
    if respondent.is_none() {
        return Err(AppError::not_found(
            "Respondent not found or is not a respondent.",
        ));
    }

    let assignment = state.db.create_assignment(&payload).await.map_err(internal)?;
    Ok(Json(assignment))
}

pub async fn assignments_for_user(
    State(state): State<SharedState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let surveys = state
        .db
        .assignments_for_user(user_id)
        .await
        .map_err(|e| AppError::internal("Server error while fetching assigned surveys.", e))?;
    Ok(Json(surveys))
}

// Gaze data

/// Stored gaze row: the wire record plus its row id.
#[derive(Debug, Serialize)]
pub struct StoredGaze {
    pub id: i64,
    #[serde(flatten)]
    pub record: GazeRecord,
}

pub async fn create_gaze(
    State(state): State<SharedState>,
    Json(record): Json<GazeRecord>,
) -> Result<impl IntoResponse, AppError> {
    let id = state
        .db
        .insert_gaze(&record)
        .await
        .map_err(|e| AppError::internal("Failed to store gaze data", e))?;

    tracing::debug!(
        survey_id = record.survey_id,
        user_id = record.user_id,
        question_id = record.question_id,
        timestamp = record.timestamp,
        "Gaze sample stored"
    );

    Ok((StatusCode::CREATED, Json(StoredGaze { id, record })))
}

#[derive(Debug, Deserialize)]
pub struct GazeQuery {
    pub survey_id: i64,
    pub user_id: i64,
    pub question_id: i64,
}

pub async fn list_gaze(
    State(state): State<SharedState>,
    Query(query): Query<GazeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let key = SessionKey::new(query.survey_id, query.user_id, query.question_id);
    let records = state
        .db
        .gaze_for_key(key)
        .await
        .map_err(|e| AppError::internal("Failed to fetch gaze data", e))?;
    Ok(Json(records))
}
