use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::password::validate_password_strength;
use crate::auth::{hash_password, Role};
use crate::cli::{utils, OutputFormat};
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum SuperadminCommands {
    #[command(about = "Create a platform superadmin (not tied to any church)")]
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

pub async fn handle(cmd: SuperadminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SuperadminCommands::Create { email, password, first_name, last_name } => {
            create(email, password, first_name, last_name, output_format).await
        }
    }
}

async fn create(
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        anyhow::bail!("'{}' is not an email address", email);
    }
    validate_password_strength(&password)?;

    let pool = DatabaseManager::pool().await?;
    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM users WHERE church_id IS NULL AND lower(email) = $1 AND is_deleted = false",
    )
    .bind(&email)
    .fetch_optional(&pool)
    .await?;
    if let Some((id,)) = existing {
        anyhow::bail!("A superadmin with email {} already exists ({})", email, id);
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, church_id, branch_id, first_name, last_name, email, password_hash, role) \
         VALUES ($1, NULL, NULL, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(&email)
    .bind(hash_password(&password)?)
    .bind(Role::Superadmin)
    .execute(&pool)
    .await?;
    DatabaseManager::close().await;

    tracing::info!("Created superadmin {} ({})", email, id);
    utils::output_success(
        &output_format,
        &format!("Superadmin {} created", email),
        Some(json!({ "id": id, "email": email })),
    )
}
