use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let url = config::config()
        .database
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let pool = DatabaseManager::pool().await?;
    DatabaseManager::migrate(&pool).await?;
    DatabaseManager::close().await;

    utils::output_success(
        &output_format,
        "Migrations applied",
        Some(json!({ "database": DatabaseManager::redacted(url)? })),
    )
}
