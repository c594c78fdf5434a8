//! Schema migrations, applied in order at startup.

use anyhow::{Context, Result};
use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // 1: core survey schema
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS surveys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        created_by INTEGER NOT NULL REFERENCES users(id)
    );
    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        survey_id INTEGER NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
        question_text TEXT NOT NULL,
        question_type TEXT NOT NULL,
        options TEXT,
        image_url TEXT
    );
    CREATE TABLE IF NOT EXISTS responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        survey_id INTEGER NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id),
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        response_text TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS survey_assignments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        survey_id INTEGER NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id)
    );",
    // 2: gaze capture. No uniqueness over (survey, user, question,
    // timestamp): delivery is at-least-once and duplicates are kept.
    "CREATE TABLE IF NOT EXISTS gaze_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        survey_id INTEGER NOT NULL,
        question_id INTEGER NOT NULL,
        image_width INTEGER NOT NULL,
        image_height INTEGER NOT NULL,
        gaze_x REAL NOT NULL,
        gaze_y REAL NOT NULL,
        timestamp INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_gaze_session
        ON gaze_data (survey_id, user_id, question_id);",
];

/// Apply all migrations. Tracked in `schema_version`, so re-running is
/// a no-op.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .context("failed to create schema_version table")?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .context("failed to read schema version")?;

    for (index, migration) in MIGRATIONS.iter().enumerate() {
        let version = index as i64 + 1;
        if version <= current {
            continue;
        }

        let tx = conn
            .transaction()
            .context("failed to begin migration transaction")?;
        tx.execute_batch(migration)
            .with_context(|| format!("migration {version} failed"))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .with_context(|| format!("failed to record migration {version}"))?;
        tx.commit()
            .with_context(|| format!("failed to commit migration {version}"))?;

        tracing::info!(version, "Applied schema migration");
    }

    Ok(())
}
