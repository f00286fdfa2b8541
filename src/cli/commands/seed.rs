use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use std::path::PathBuf;
use uuid::Uuid;

use crate::auth::{hash_password, Role};
use crate::cli::{utils, OutputFormat};
use crate::database::DatabaseManager;

/// Top level of a seed file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub churches: Vec<ChurchFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChurchFixture {
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub branches: Vec<BranchFixture>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchFixture {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserFixture {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Plaintext; hashed on import
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    /// Branch name within the same church
    pub branch: Option<String>,
}

fn default_role() -> Role {
    Role::Member
}

#[derive(Debug, Default)]
struct SeedCounts {
    churches: usize,
    branches: usize,
    users: usize,
    skipped_users: usize,
}

impl Fixture {
    pub fn parse(yaml: &str) -> anyhow::Result<Self> {
        let fixture: Fixture = serde_yaml::from_str(yaml)?;
        fixture.check()?;
        Ok(fixture)
    }

    /// Structural checks that do not need the database
    fn check(&self) -> anyhow::Result<()> {
        for church in &self.churches {
            for user in &church.users {
                if user.role == Role::Superadmin {
                    anyhow::bail!("{}: superadmins are created with `flock superadmin create`", user.email);
                }
                if let Some(branch) = &user.branch {
                    if !church.branches.iter().any(|b| b.name.eq_ignore_ascii_case(branch)) {
                        anyhow::bail!("{}: branch '{}' is not defined for church '{}'", user.email, branch, church.slug);
                    }
                }
            }
        }
        Ok(())
    }
}

pub async fn handle(file: PathBuf, output_format: OutputFormat) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(&file)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", file.display(), e))?;
    let fixture = Fixture::parse(&yaml)?;

    let pool = DatabaseManager::pool().await?;
    let mut tx = pool.begin().await?;
    let mut counts = SeedCounts::default();
    for church in &fixture.churches {
        seed_church(&mut tx, church, &mut counts).await?;
    }
    tx.commit().await?;
    DatabaseManager::close().await;

    match output_format {
        OutputFormat::Json => utils::output_success(
            &output_format,
            &format!("Seeded {}", file.display()),
            Some(json!({
                "churches": counts.churches,
                "branches": counts.branches,
                "users": counts.users,
                "skipped_users": counts.skipped_users,
            })),
        ),
        OutputFormat::Text => {
            utils::output_success(&output_format, &format!("Seeded {}", file.display()), None)?;
            utils::output_fields(
                &output_format,
                &[
                    ("churches", counts.churches.to_string()),
                    ("branches", counts.branches.to_string()),
                    ("users", counts.users.to_string()),
                    ("skipped users", counts.skipped_users.to_string()),
                ],
            )
        }
    }
}

/// Existing churches (by slug) and branches (by name) are reused; users whose
/// email is already taken in the church are skipped.
async fn seed_church(tx: &mut Transaction<'_, Postgres>, church: &ChurchFixture, counts: &mut SeedCounts) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM churches WHERE lower(slug) = lower($1) AND is_deleted = false")
            .bind(&church.slug)
            .fetch_optional(&mut **tx)
            .await?;
    let church_id = match existing {
        Some((id,)) => id,
        None => {
            let id = Uuid::new_v4();
            sqlx::query("INSERT INTO churches (id, name, slug, email, phone, address) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(id)
                .bind(&church.name)
                .bind(church.slug.to_lowercase())
                .bind(&church.email)
                .bind(&church.phone)
                .bind(&church.address)
                .execute(&mut **tx)
                .await?;
            counts.churches += 1;
            id
        }
    };

    let mut branch_ids = Vec::with_capacity(church.branches.len());
    for branch in &church.branches {
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM branches WHERE church_id = $1 AND lower(name) = lower($2) AND is_deleted = false",
        )
        .bind(church_id)
        .bind(&branch.name)
        .fetch_optional(&mut **tx)
        .await?;
        let branch_id = match existing {
            Some((id,)) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO branches (id, church_id, name, address, city, phone, email) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(id)
                .bind(church_id)
                .bind(&branch.name)
                .bind(&branch.address)
                .bind(&branch.city)
                .bind(&branch.phone)
                .bind(&branch.email)
                .execute(&mut **tx)
                .await?;
                counts.branches += 1;
                id
            }
        };
        branch_ids.push((branch.name.to_lowercase(), branch_id));
    }

    for user in &church.users {
        let email = user.email.trim().to_lowercase();
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE church_id = $1 AND lower(email) = $2 AND is_deleted = false")
                .bind(church_id)
                .bind(&email)
                .fetch_optional(&mut **tx)
                .await?;
        if taken.is_some() {
            tracing::info!("Skipping {}: already registered in {}", email, church.slug);
            counts.skipped_users += 1;
            continue;
        }

        let branch_id = user.branch.as_ref().and_then(|name| {
            let name = name.to_lowercase();
            branch_ids.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
        });

        // The role's details column starts as an empty object
        let details_column = user.role.details_field().unwrap_or("member_details");
        sqlx::query(&format!(
            "INSERT INTO users (id, church_id, branch_id, first_name, last_name, email, phone, password_hash, role, {}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '{{}}'::jsonb)",
            details_column
        ))
        .bind(Uuid::new_v4())
        .bind(church_id)
        .bind(branch_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&email)
        .bind(&user.phone)
        .bind(hash_password(&user.password)?)
        .bind(user.role)
        .execute(&mut **tx)
        .await?;
        counts.users += 1;
    }

    tracing::info!("Seeded church {} ({})", church.slug, church_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_fixture() {
        let fixture = Fixture::parse(include_str!("../../../fixtures/demo.yaml")).unwrap();
        assert!(!fixture.churches.is_empty());
        let church = &fixture.churches[0];
        assert!(church.users.iter().any(|u| u.role == Role::Admin));
        assert!(church.users.iter().all(|u| u.role != Role::Superadmin));
    }

    #[test]
    fn rejects_unknown_branch() {
        let yaml = r#"
churches:
  - name: Grace
    slug: grace
    branches:
      - name: Downtown
    users:
      - first_name: Ann
        last_name: Lee
        email: ann@grace.org
        password: Str0ng!pass
        branch: Uptown
"#;
        let err = Fixture::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("Uptown"));
    }

    #[test]
    fn rejects_superadmin_rows() {
        let yaml = r#"
churches:
  - name: Grace
    slug: grace
    users:
      - first_name: Root
        last_name: User
        email: root@grace.org
        password: Str0ng!pass
        role: superadmin
"#;
        assert!(Fixture::parse(yaml).is_err());
    }

    #[test]
    fn role_defaults_to_member() {
        let yaml = r#"
churches:
  - name: Grace
    slug: grace
    users:
      - first_name: Ann
        last_name: Lee
        email: ann@grace.org
        password: Str0ng!pass
"#;
        let fixture = Fixture::parse(yaml).unwrap();
        assert_eq!(fixture.churches[0].users[0].role, Role::Member);
    }
}
