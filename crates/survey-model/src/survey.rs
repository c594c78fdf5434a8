//! Survey domain types: users, surveys, questions, responses, and
//! assignments.
//!
//! These mirror the storage service's JSON contract; every field name is
//! wire-exact.

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates surveys and reviews responses and gaze data.
    Admin,
    /// Takes assigned surveys.
    Respondent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Respondent => "respondent",
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// Payload for login-or-create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
}

/// A survey authored by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_by: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurvey {
    pub title: String,
    pub description: String,
    pub created_by: i64,
}

/// The kind of answer a question collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    ShortAnswer,
    Date,
    Dropdown,
    MultipleChoice,
    /// A diagnostic image question; the one kind that carries an
    /// `image_url` and is eligible for gaze tracking.
    Image,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::ShortAnswer => "short_answer",
            QuestionKind::Date => "date",
            QuestionKind::Dropdown => "dropdown",
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::Image => "image",
        }
    }
}

/// One question within a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub survey_id: i64,
    pub question_text: String,
    pub question_type: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub survey_id: i64,
    pub question_text: String,
    pub question_type: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One submitted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub survey_id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub response_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResponse {
    pub survey_id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub response_text: String,
}

/// Links a survey to a respondent account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyAssignment {
    pub id: i64,
    pub survey_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
    pub survey_id: i64,
    pub user_id: i64,
}

/// One answer within the grouped-responses view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnswer {
    pub response_id: i64,
    pub response_text: String,
    pub user_id: i64,
    pub username: String,
}

/// All answers to one question, for the reviewer's grouped view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponses {
    pub question_id: i64,
    pub question_text: String,
    pub answers: Vec<ResponseAnswer>,
}
