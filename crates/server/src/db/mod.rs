//! Relational store on a dedicated worker thread.
//!
//! rusqlite connections are not `Sync`, so all queries run on one
//! blocking thread fed by a command channel; async callers get their
//! results back over oneshot channels.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;
use oculo_survey_model::gaze::{GazeRecord, SessionKey};
use oculo_survey_model::survey::{
    NewAssignment, NewQuestion, NewResponse, NewSurvey, NewUser, Question, QuestionKind,
    QuestionResponses, Response, ResponseAnswer, Role, Survey, SurveyAssignment, User,
};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                tracing::error!(error = %err, "Failed to send shutdown to DB thread");
            }
            if let Err(join_err) = handle.join() {
                tracing::error!(?join_err, "Failed to join DB thread");
            }
        }
    }
}

fn role_from_str(value: &str) -> Result<Role> {
    match value {
        "admin" => Ok(Role::Admin),
        "respondent" => Ok(Role::Respondent),
        _ => Err(anyhow!("unknown role '{value}'")),
    }
}

fn kind_from_str(value: &str) -> Result<QuestionKind> {
    match value {
        "short_answer" => Ok(QuestionKind::ShortAnswer),
        "date" => Ok(QuestionKind::Date),
        "dropdown" => Ok(QuestionKind::Dropdown),
        "multiple_choice" => Ok(QuestionKind::MultipleChoice),
        "image" => Ok(QuestionKind::Image),
        _ => Err(anyhow!("unknown question type '{value}'")),
    }
}

fn options_to_json(options: &Option<Vec<String>>) -> Result<Option<String>> {
    options
        .as_ref()
        .map(|opts| serde_json::to_string(opts).context("failed to encode question options"))
        .transpose()
}

fn options_from_json(value: Option<String>) -> Result<Option<Vec<String>>> {
    value
        .map(|json| serde_json::from_str(&json).context("failed to decode question options"))
        .transpose()
}

/// Raw question row; kind and options stay unparsed because decoding
/// them can fail outside rusqlite's error type.
struct QuestionRow {
    id: i64,
    survey_id: i64,
    question_text: String,
    kind: String,
    options: Option<String>,
    image_url: Option<String>,
}

fn question_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuestionRow> {
    Ok(QuestionRow {
        id: row.get(0)?,
        survey_id: row.get(1)?,
        question_text: row.get(2)?,
        kind: row.get(3)?,
        options: row.get(4)?,
        image_url: row.get(5)?,
    })
}

fn question_from_parts(row: QuestionRow) -> Result<Question> {
    Ok(Question {
        id: row.id,
        survey_id: row.survey_id,
        question_text: row.question_text,
        question_type: kind_from_str(&row.kind)?,
        options: options_from_json(row.options)?,
        image_url: row.image_url,
    })
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("oculo-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    tracing::error!(error = %err, "Failed to enable WAL mode");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    tracing::error!(error = %err, "Failed to enable foreign keys");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    tracing::error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                tracing::info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        tracing::info!("Database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                tracing::error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    // Users

    /// Insert the user, or return the existing row when the username is
    /// already registered (treated as login).
    pub async fn login_or_create_user(&self, new_user: &NewUser) -> Result<User> {
        let user = new_user.clone();
        self.execute(move |conn| {
            let existing = conn
                .query_row(
                    "SELECT id, username, role FROM users WHERE username = ?1",
                    params![user.username],
                    user_from_row,
                )
                .optional()
                .context("failed to look up user")?;
            if let Some(row) = existing {
                return row;
            }

            conn.execute(
                "INSERT INTO users (username, role) VALUES (?1, ?2)",
                params![user.username, user.role.as_str()],
            )
            .context("failed to insert user")?;

            Ok(User {
                id: conn.last_insert_rowid(),
                username: user.username,
                role: user.role,
            })
        })
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT id, username, role FROM users ORDER BY id")?;
            let mut rows = stmt.query([])?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(user_from_row(row)?);
            }
            users.into_iter().collect()
        })
        .await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.execute(move |conn| {
            conn.query_row(
                "SELECT id, username, role FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
            .context("failed to fetch user")?
            .transpose()
        })
        .await
    }

    // Surveys

    pub async fn create_survey(&self, new_survey: &NewSurvey) -> Result<Survey> {
        let survey = new_survey.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO surveys (title, description, created_by) VALUES (?1, ?2, ?3)",
                params![survey.title, survey.description, survey.created_by],
            )
            .context("failed to insert survey")?;
            Ok(Survey {
                id: conn.last_insert_rowid(),
                title: survey.title,
                description: survey.description,
                created_by: survey.created_by,
            })
        })
        .await
    }

    pub async fn get_survey(&self, id: i64) -> Result<Option<Survey>> {
        self.execute(move |conn| {
            conn.query_row(
                "SELECT id, title, description, created_by FROM surveys WHERE id = ?1",
                params![id],
                survey_from_row,
            )
            .optional()
            .context("failed to fetch survey")
        })
        .await
    }

    pub async fn list_surveys(&self) -> Result<Vec<Survey>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title, description, created_by FROM surveys ORDER BY id")?;
            let rows = stmt.query_map([], survey_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to list surveys")
        })
        .await
    }

    /// Delete a survey and its dependents. Returns the deleted row, or
    /// `None` when the survey never existed.
    pub async fn delete_survey(&self, id: i64) -> Result<Option<Survey>> {
        self.execute(move |conn| {
            let survey = conn
                .query_row(
                    "SELECT id, title, description, created_by FROM surveys WHERE id = ?1",
                    params![id],
                    survey_from_row,
                )
                .optional()
                .context("failed to fetch survey")?;
            let Some(survey) = survey else {
                return Ok(None);
            };

            conn.execute("DELETE FROM surveys WHERE id = ?1", params![id])
                .context("failed to delete survey")?;
            Ok(Some(survey))
        })
        .await
    }

    // Questions

    pub async fn create_question(&self, new_question: &NewQuestion) -> Result<Question> {
        let question = new_question.clone();
        self.execute(move |conn| {
            let options_json = options_to_json(&question.options)?;
            conn.execute(
                "INSERT INTO questions (survey_id, question_text, question_type, options, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    question.survey_id,
                    question.question_text,
                    question.question_type.as_str(),
                    options_json,
                    question.image_url,
                ],
            )
            .context("failed to insert question")?;

            Ok(Question {
                id: conn.last_insert_rowid(),
                survey_id: question.survey_id,
                question_text: question.question_text,
                question_type: question.question_type,
                options: question.options,
                image_url: question.image_url,
            })
        })
        .await
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<Question>> {
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, survey_id, question_text, question_type, options, image_url
                     FROM questions WHERE id = ?1",
                    params![id],
                    question_row,
                )
                .optional()
                .context("failed to fetch question")?;

            row.map(question_from_parts).transpose()
        })
        .await
    }

    pub async fn questions_for_survey(&self, survey_id: i64) -> Result<Vec<Question>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, survey_id, question_text, question_type, options, image_url
                 FROM questions WHERE survey_id = ?1 ORDER BY id",
            )?;
            let mut rows = stmt.query(params![survey_id])?;
            let mut questions = Vec::new();
            while let Some(row) = rows.next()? {
                questions.push(question_from_parts(question_row(row)?)?);
            }
            Ok(questions)
        })
        .await
    }

    // Responses

    pub async fn create_response(&self, new_response: &NewResponse) -> Result<Response> {
        let response = new_response.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO responses (survey_id, user_id, question_id, response_text)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    response.survey_id,
                    response.user_id,
                    response.question_id,
                    response.response_text,
                ],
            )
            .context("failed to insert response")?;

            Ok(Response {
                id: conn.last_insert_rowid(),
                survey_id: response.survey_id,
                user_id: response.user_id,
                question_id: response.question_id,
                response_text: response.response_text,
            })
        })
        .await
    }

    /// Whether this user already answered this question of this survey.
    pub async fn has_response(&self, survey_id: i64, user_id: i64, question_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM responses
                 WHERE survey_id = ?1 AND user_id = ?2 AND question_id = ?3",
                params![survey_id, user_id, question_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn responses_filtered(
        &self,
        survey_id: i64,
        user_id: Option<i64>,
    ) -> Result<Vec<Response>> {
        self.execute(move |conn| {
            let mut responses = Vec::new();
            let mut push = |row: &rusqlite::Row<'_>| -> rusqlite::Result<()> {
                responses.push(Response {
                    id: row.get(0)?,
                    survey_id: row.get(1)?,
                    user_id: row.get(2)?,
                    question_id: row.get(3)?,
                    response_text: row.get(4)?,
                });
                Ok(())
            };

            match user_id {
                Some(user_id) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, survey_id, user_id, question_id, response_text
                         FROM responses WHERE survey_id = ?1 AND user_id = ?2 ORDER BY question_id",
                    )?;
                    let mut rows = stmt.query(params![survey_id, user_id])?;
                    while let Some(row) = rows.next()? {
                        push(row)?;
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, survey_id, user_id, question_id, response_text
                         FROM responses WHERE survey_id = ?1 ORDER BY question_id",
                    )?;
                    let mut rows = stmt.query(params![survey_id])?;
                    while let Some(row) = rows.next()? {
                        push(row)?;
                    }
                }
            }

            Ok(responses)
        })
        .await
    }

    /// All answers to a survey, grouped per question with usernames.
    pub async fn grouped_responses(&self, survey_id: i64) -> Result<Vec<QuestionResponses>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT q.id, q.question_text, r.id, r.response_text, u.id, u.username
                 FROM responses r
                 JOIN questions q ON q.id = r.question_id
                 JOIN users u ON u.id = r.user_id
                 WHERE r.survey_id = ?1
                 ORDER BY q.id",
            )?;

            let mut rows = stmt.query(params![survey_id])?;
            let mut grouped: Vec<QuestionResponses> = Vec::new();
            while let Some(row) = rows.next()? {
                let question_id: i64 = row.get(0)?;
                let answer = ResponseAnswer {
                    response_id: row.get(2)?,
                    response_text: row.get(3)?,
                    user_id: row.get(4)?,
                    username: row.get(5)?,
                };

                match grouped.last_mut() {
                    Some(group) if group.question_id == question_id => {
                        group.answers.push(answer);
                    }
                    _ => grouped.push(QuestionResponses {
                        question_id,
                        question_text: row.get(1)?,
                        answers: vec![answer],
                    }),
                }
            }

            Ok(grouped)
        })
        .await
    }

    // Assignments

    pub async fn create_assignment(&self, new_assignment: &NewAssignment) -> Result<SurveyAssignment> {
        let assignment = new_assignment.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO survey_assignments (survey_id, user_id) VALUES (?1, ?2)",
                params![assignment.survey_id, assignment.user_id],
            )
            .context("failed to insert assignment")?;

            Ok(SurveyAssignment {
                id: conn.last_insert_rowid(),
                survey_id: assignment.survey_id,
                user_id: assignment.user_id,
            })
        })
        .await
    }

    /// The surveys assigned to a user.
    pub async fn assignments_for_user(&self, user_id: i64) -> Result<Vec<Survey>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, s.description, s.created_by
                 FROM surveys s
                 INNER JOIN survey_assignments sa ON sa.survey_id = s.id
                 WHERE sa.user_id = ?1
                 ORDER BY s.id",
            )?;
            let rows = stmt.query_map(params![user_id], survey_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to list assigned surveys")
        })
        .await
    }

    // Gaze data

    /// Store one gaze sample. Returns the new row id.
    pub async fn insert_gaze(&self, record: &GazeRecord) -> Result<i64> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO gaze_data (
                    user_id, survey_id, question_id,
                    image_width, image_height, gaze_x, gaze_y, timestamp
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.user_id,
                    record.survey_id,
                    record.question_id,
                    record.image_width,
                    record.image_height,
                    record.gaze_x,
                    record.gaze_y,
                    record.timestamp,
                ],
            )
            .context("failed to insert gaze sample")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// The stored samples for one session key, in insertion order.
    pub async fn gaze_for_key(&self, key: SessionKey) -> Result<Vec<GazeRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, survey_id, question_id,
                        image_width, image_height, gaze_x, gaze_y, timestamp
                 FROM gaze_data
                 WHERE survey_id = ?1 AND user_id = ?2 AND question_id = ?3
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(
                params![key.survey_id, key.user_id, key.question_id],
                |row| {
                    Ok(GazeRecord {
                        user_id: row.get(0)?,
                        survey_id: row.get(1)?,
                        question_id: row.get(2)?,
                        image_width: row.get(3)?,
                        image_height: row.get(4)?,
                        gaze_x: row.get(5)?,
                        gaze_y: row.get(6)?,
                        timestamp: row.get(7)?,
                    })
                },
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to list gaze samples")
        })
        .await
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<User>> {
    let id: i64 = row.get(0)?;
    let username: String = row.get(1)?;
    let role: String = row.get(2)?;
    Ok(role_from_str(&role).map(|role| User { id, username, role }))
}

fn survey_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Survey> {
    Ok(Survey {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
    })
}
