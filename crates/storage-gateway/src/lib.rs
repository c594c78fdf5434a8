//! Oculo Storage Gateway
//!
//! HTTP+JSON client for the storage service. Two halves:
//!
//! - [`GazeGateway`] — best-effort persistence of gaze samples. Flush is
//!   one request per sample with no transactional grouping; per-sample
//!   failures are logged and skipped, never retried. Fetch failures come
//!   back as an empty result set ("no data yet").
//! - [`SurveyClient`] — the small survey CRUD surface the CLI drives.
//!   Unlike the gaze paths, these propagate errors.

use reqwest::Client;

use oculo_common::config::GatewayConfig;
use oculo_common::error::{OculoError, OculoResult};
use oculo_gaze_tracker::session::SampleSink;
use oculo_survey_model::gaze::{GazeRecord, GazeSample, SessionContext, SessionKey};
use oculo_survey_model::survey::{
    NewAssignment, NewQuestion, NewResponse, NewSurvey, NewUser, Question, Response, Survey,
    SurveyAssignment, User,
};

/// Error body shape of the storage service.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: String,
}

/// Best-effort gaze persistence client.
#[derive(Debug, Clone)]
pub struct GazeGateway {
    client: Client,
    base_url: String,
}

impl GazeGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Persist one session's samples, one `POST /gaze-data` per sample.
    ///
    /// Failed sends are logged and skipped; the remaining samples are
    /// still attempted. Partial persistence is possible and is not
    /// rolled back. Returns how many samples the service accepted.
    pub async fn flush(&self, ctx: &SessionContext, samples: &[GazeSample]) -> u64 {
        let url = format!("{}/gaze-data", self.base_url);
        let mut accepted = 0u64;

        for sample in samples {
            let record = GazeRecord::from_sample(ctx, sample);
            let result = self.client.post(&url).json(&record).send().await;
            match result {
                Ok(response) if response.status().is_success() => accepted += 1,
                Ok(response) => {
                    let status = response.status();
                    let message = response
                        .json::<ErrorBody>()
                        .await
                        .map(|b| b.error)
                        .unwrap_or_default();
                    tracing::warn!(
                        %status,
                        message,
                        timestamp = record.timestamp,
                        "Gaze sample rejected by storage service"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        timestamp = record.timestamp,
                        "Gaze sample send failed"
                    );
                }
            }
        }

        tracing::info!(
            accepted,
            total = samples.len(),
            survey_id = ctx.key.survey_id,
            question_id = ctx.key.question_id,
            "Gaze flush finished"
        );
        accepted
    }

    /// Fetch the stored samples for a session key.
    ///
    /// Any failure yields an empty vector rather than an error; the
    /// reviewer simply sees an empty heatmap.
    pub async fn fetch(&self, key: &SessionKey) -> Vec<GazeRecord> {
        let url = format!("{}/gaze_data", self.base_url);
        let result = self
            .client
            .get(&url)
            .query(&[
                ("survey_id", key.survey_id),
                ("user_id", key.user_id),
                ("question_id", key.question_id),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<Vec<GazeRecord>>().await {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!(error = %e, "Gaze fetch returned malformed body");
                        Vec::new()
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Gaze fetch failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gaze fetch failed");
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl SampleSink for GazeGateway {
    async fn flush(&self, ctx: &SessionContext, samples: &[GazeSample]) -> OculoResult<u64> {
        Ok(GazeGateway::flush(self, ctx, samples).await)
    }
}

/// Survey CRUD client.
#[derive(Debug, Clone)]
pub struct SurveyClient {
    client: Client,
    base_url: String,
}

impl SurveyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    async fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> OculoResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| OculoError::storage(format!("POST {path} failed: {e}")))?;
        Self::decode(path, response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> OculoResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OculoError::storage(format!("GET {path} failed: {e}")))?;
        Self::decode(path, response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> OculoResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(OculoError::storage(format!("{path}: {message}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| OculoError::storage(format!("{path}: malformed response: {e}")))
    }

    /// Log in, creating the account on first use.
    pub async fn login(&self, user: &NewUser) -> OculoResult<User> {
        self.post("/users", user).await
    }

    pub async fn create_survey(&self, survey: &NewSurvey) -> OculoResult<Survey> {
        self.post("/surveys", survey).await
    }

    pub async fn list_surveys(&self) -> OculoResult<Vec<Survey>> {
        self.get("/surveys").await
    }

    pub async fn create_question(&self, question: &NewQuestion) -> OculoResult<Question> {
        self.post("/questions", question).await
    }

    pub async fn questions_for_survey(&self, survey_id: i64) -> OculoResult<Vec<Question>> {
        self.get(&format!("/surveys/{survey_id}/questions")).await
    }

    pub async fn submit_response(&self, response: &NewResponse) -> OculoResult<Response> {
        self.post("/responses", response).await
    }

    pub async fn assign_survey(&self, assignment: &NewAssignment) -> OculoResult<SurveyAssignment> {
        self.post("/survey-assignments", assignment).await
    }

    pub async fn assigned_surveys(&self, user_id: i64) -> OculoResult<Vec<Survey>> {
        self.get(&format!("/survey-assignments/{user_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oculo_survey_model::gaze::SessionKey;

    // 127.0.0.1:9 (discard) refuses connections immediately, which is
    // exactly the failure mode these paths must absorb.
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

    #[test]
    fn base_url_is_normalized() {
        let gateway = GazeGateway::new("http://localhost:5050/");
        assert_eq!(gateway.base_url(), "http://localhost:5050");
    }

    #[tokio::test]
    async fn fetch_failure_yields_empty() {
        let gateway = GazeGateway::new(DEAD_ENDPOINT);
        let records = gateway.fetch(&SessionKey::new(1, 2, 3)).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn flush_failure_accepts_nothing_but_returns() {
        let gateway = GazeGateway::new(DEAD_ENDPOINT);
        let ctx = SessionContext::new(SessionKey::new(1, 2, 3), 100, 100);
        let samples = vec![GazeSample::new(1.0, 1.0, 0), GazeSample::new(2.0, 2.0, 1)];
        let accepted = gateway.flush(&ctx, &samples).await;
        assert_eq!(accepted, 0);
    }

    #[tokio::test]
    async fn survey_client_propagates_errors() {
        let client = SurveyClient::new(DEAD_ENDPOINT);
        assert!(client.list_surveys().await.is_err());
    }
}
