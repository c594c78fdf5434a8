//! Shared service state.

use std::sync::Arc;

use anyhow::Result;

use oculo_common::config::ServerConfig;

use crate::db::Database;

pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Arc<Self>> {
        let db = Database::new(config.database_path.clone())?;
        Ok(Arc::new(Self { db, config }))
    }

    /// State backed by an existing database (tests bring their own).
    pub fn with_database(db: Database, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self { db, config })
    }
}
