//! Run the storage service.

use std::path::PathBuf;

use oculo_common::config::AppConfig;

pub async fn run(port: u16, database: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().server;
    config.port = port;
    if let Some(database) = database {
        config.database_path = database;
    }

    oculo_server::start_server(config).await
}
