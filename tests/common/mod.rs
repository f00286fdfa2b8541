#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const PASSWORD: &str = "integration-pass";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Cargo builds the binary before integration tests run
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_flock-api"));
        cmd.env("FLOCK_API_PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    /// Ready once /health answers 200, which also means migrations ran.
    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become healthy on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// The database-backed suites run only when DATABASE_URL is configured.
pub fn database_url() -> Option<String> {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").ok()
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(20)).await?;
    Ok(server)
}

pub async fn connect(url: &str) -> Result<PgPool> {
    Ok(PgPoolOptions::new().max_connections(2).connect(url).await?)
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
}

/// A fresh church with two branches and one user per role, unique per call.
#[derive(Debug, Clone)]
pub struct SeededChurch {
    pub slug: String,
    pub church_id: Uuid,
    pub branch_a: Uuid,
    pub branch_b: Uuid,
    pub admin: Account,
    pub bishop: Account,
    pub pastor: Account,
    pub member: Account,
    pub other_member: Account,
}

pub async fn seed_church(pool: &PgPool) -> Result<SeededChurch> {
    let tag = Uuid::new_v4().simple().to_string()[..10].to_string();
    let slug = format!("it-{}", tag);
    let church_id = Uuid::new_v4();
    sqlx::query("INSERT INTO churches (id, name, slug) VALUES ($1, $2, $3)")
        .bind(church_id)
        .bind(format!("Integration {}", tag))
        .bind(&slug)
        .execute(pool)
        .await?;

    let mut branches = Vec::new();
    for name in ["North", "South"] {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO branches (id, church_id, name) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(church_id)
            .bind(name)
            .execute(pool)
            .await?;
        branches.push(id);
    }
    let (branch_a, branch_b) = (branches[0], branches[1]);

    let hash = flock_api::auth::hash_password(PASSWORD)?;
    let admin = insert_user(pool, church_id, None, "admin", "admin", &tag, &hash).await?;
    let bishop = insert_user(pool, church_id, None, "bishop", "bishop", &tag, &hash).await?;
    let pastor = insert_user(pool, church_id, Some(branch_a), "pastor", "pastor", &tag, &hash).await?;
    let member = insert_user(pool, church_id, Some(branch_a), "member", "member", &tag, &hash).await?;
    let other_member = insert_user(pool, church_id, Some(branch_b), "member", "other", &tag, &hash).await?;

    Ok(SeededChurch { slug, church_id, branch_a, branch_b, admin, bishop, pastor, member, other_member })
}

/// A churchless superadmin with a unique email
pub async fn seed_superadmin(pool: &PgPool) -> Result<Account> {
    let tag = Uuid::new_v4().simple().to_string()[..10].to_string();
    let email = format!("root.{}@example.org", tag);
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, first_name, last_name, email, password_hash, role) \
         VALUES ($1, 'root', 'Tester', $2, $3, 'superadmin')",
    )
    .bind(id)
    .bind(&email)
    .bind(flock_api::auth::hash_password(PASSWORD)?)
    .execute(pool)
    .await?;
    Ok(Account { id, email })
}

async fn insert_user(
    pool: &PgPool,
    church_id: Uuid,
    branch_id: Option<Uuid>,
    role: &str,
    name: &str,
    tag: &str,
    hash: &str,
) -> Result<Account> {
    let email = format!("{}.{}@example.org", name, tag);
    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO users (id, church_id, branch_id, first_name, last_name, email, password_hash, role, {}_details) \
         VALUES ($1, $2, $3, $4, 'Tester', $5, $6, $7, '{{}}'::jsonb)",
        role
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(church_id)
        .bind(branch_id)
        .bind(name)
        .bind(&email)
        .bind(hash)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(Account { id, email })
}

pub async fn login(server: &TestServer, account: &Account, slug: &str) -> Result<String> {
    sign_in(server, account, json!({ "email": account.email, "password": PASSWORD, "church": slug })).await
}

/// Login without a church slug, as superadmins do
pub async fn login_global(server: &TestServer, account: &Account) -> Result<String> {
    sign_in(server, account, json!({ "email": account.email, "password": PASSWORD })).await
}

async fn sign_in(server: &TestServer, account: &Account, body: Value) -> Result<String> {
    let res = reqwest::Client::new()
        .post(server.url("/auth/login"))
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login failed for {}: {}", account.email, res.status());
    let body: Value = res.json().await?;
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("login response had no token")
}

/// GET with a bearer token, returning status and parsed body
pub async fn get(server: &TestServer, token: &str, path: &str) -> Result<(StatusCode, Value)> {
    let res = reqwest::Client::new().get(server.url(path)).bearer_auth(token).send().await?;
    let status = res.status();
    Ok((status, res.json().await?))
}

pub async fn send(
    server: &TestServer,
    token: &str,
    method: reqwest::Method,
    path: &str,
    body: Value,
) -> Result<(StatusCode, Value)> {
    let res = reqwest::Client::new()
        .request(method, server.url(path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;
    let status = res.status();
    Ok((status, res.json().await?))
}
