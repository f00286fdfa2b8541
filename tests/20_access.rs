// Database-backed flows against a spawned server. Skipped unless
// DATABASE_URL is set.

mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{
    database_url, ensure_server, get, login, login_global, seed_church, seed_superadmin, send, SeededChurch, TestServer,
};

struct Session {
    server: &'static TestServer,
    church: SeededChurch,
    admin: String,
    pastor: String,
    member: String,
}

async fn session() -> Result<Option<Session>> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(None);
    };
    let server = ensure_server().await?;
    let pool = common::connect(&url).await?;
    let church = seed_church(&pool).await?;
    pool.close().await;

    let admin = login(server, &church.admin, &church.slug).await?;
    let pastor = login(server, &church.pastor, &church.slug).await?;
    let member = login(server, &church.member, &church.slug).await?;
    Ok(Some(Session { server, church, admin, pastor, member }))
}

#[tokio::test]
async fn role_gates_per_resource() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    // Finance is closed to members
    assert_eq!(get(s.server, &s.member, "/api/finance").await?.0, StatusCode::FORBIDDEN);
    assert_eq!(get(s.server, &s.pastor, "/api/finance").await?.0, StatusCode::OK);
    assert_eq!(get(s.server, &s.admin, "/api/finance/summary").await?.0, StatusCode::OK);

    // Member directory is pastoral
    assert_eq!(get(s.server, &s.member, "/api/users").await?.0, StatusCode::FORBIDDEN);
    assert_eq!(get(s.server, &s.pastor, "/api/users").await?.0, StatusCode::OK);

    // Everyone sees branches; only superadmins reach /api/root
    assert_eq!(get(s.server, &s.member, "/api/branches").await?.0, StatusCode::OK);
    assert_eq!(get(s.server, &s.admin, "/api/root/churches").await?.0, StatusCode::FORBIDDEN);

    // Reports are for leaders
    assert_eq!(get(s.server, &s.member, "/api/reports/summary").await?.0, StatusCode::FORBIDDEN);
    let (status, body) = get(s.server, &s.admin, "/api/reports/summary").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_members"], 5);
    Ok(())
}

#[tokio::test]
async fn pastors_only_see_their_branch() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let (status, body) = get(s.server, &s.pastor, "/api/users?limit=100").await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<String> = body["data"]["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|u| u["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    assert!(ids.contains(&s.church.member.id.to_string()));
    assert!(!ids.contains(&s.church.other_member.id.to_string()));

    // Writing outside the branch is refused
    let (status, _) = send(
        s.server,
        &s.pastor,
        Method::PUT,
        &format!("/api/users/{}", s.church.other_member.id),
        json!({ "address": "Elsewhere" }),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn members_get_public_cards_only() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let (status, body) = get(s.server, &s.member, &format!("/api/users/{}", s.church.other_member.id)).await?;
    assert_eq!(status, StatusCode::OK);
    let user = &body["data"];
    assert_eq!(user["first_name"], "other");
    assert!(user.get("email").is_none());
    assert!(user.get("phone").is_none());
    assert!(user.get("password_hash").is_none());

    let (_, me) = get(s.server, &s.member, "/api/auth/whoami").await?;
    assert_eq!(me["data"]["email"], s.church.member.email.as_str());
    assert!(me["data"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn members_cannot_change_their_role() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let path = format!("/api/users/{}", s.church.member.id);
    let (status, _) = send(s.server, &s.member, Method::PUT, &path, json!({ "role": "admin" })).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Plain profile edits on their own record are fine
    let (status, body) = send(s.server, &s.member, Method::PUT, &path, json!({ "address": "1 Hill Road" })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["address"], "1 Hill Road");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let (status, body) = send(
        s.server,
        &s.admin,
        Method::POST,
        "/api/users",
        json!({
            "first_name": "Copy",
            "last_name": "Cat",
            "email": s.church.member.email.to_uppercase(),
            "password": "another-pass",
            "branch_id": s.church.branch_a,
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert!(body["field_errors"]["email"].is_string());
    Ok(())
}

#[tokio::test]
async fn duplicate_phone_is_a_conflict() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let phone = "+1 555 010 0200";
    let member_path = format!("/api/users/{}", s.church.member.id);
    let (status, _) = send(s.server, &s.admin, Method::PUT, &member_path, json!({ "phone": phone })).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        s.server,
        &s.admin,
        Method::POST,
        "/api/users",
        json!({
            "first_name": "Same",
            "last_name": "Number",
            "email": format!("same.number@{}.example.org", s.church.slug),
            "phone": phone,
            "password": "another-pass",
            "branch_id": s.church.branch_a,
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["field_errors"]["phone"].is_string());

    let other_path = format!("/api/users/{}", s.church.other_member.id);
    let (status, body) = send(s.server, &s.admin, Method::PUT, &other_path, json!({ "phone": phone })).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["field_errors"]["phone"].is_string());

    let (_, other) = get(s.server, &s.admin, &other_path).await?;
    assert!(other["data"]["phone"].is_null());
    Ok(())
}

#[tokio::test]
async fn moving_church_rechecks_uniqueness_there() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    let server = ensure_server().await?;
    let pool = common::connect(&url).await?;
    let from = seed_church(&pool).await?;
    let to = seed_church(&pool).await?;
    let root = seed_superadmin(&pool).await?;
    pool.close().await;

    // The same phone is fine in two different churches
    let phone = "+1 555 010 0300";
    let to_admin = login(server, &to.admin, &to.slug).await?;
    let from_admin = login(server, &from.admin, &from.slug).await?;
    let (status, _) =
        send(server, &to_admin, Method::PUT, &format!("/api/users/{}", to.member.id), json!({ "phone": phone })).await?;
    assert_eq!(status, StatusCode::OK);
    let mover = format!("/api/users/{}", from.member.id);
    let (status, _) = send(server, &from_admin, Method::PUT, &mover, json!({ "phone": phone })).await?;
    assert_eq!(status, StatusCode::OK);

    let root = login_global(server, &root).await?;
    let (status, body) = send(
        server,
        &root,
        Method::PUT,
        &mover,
        json!({ "church_id": to.church_id, "branch_id": to.branch_a }),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["field_errors"]["phone"].is_string());

    let (_, unmoved) = get(server, &root, &mover).await?;
    assert_eq!(unmoved["data"]["church_id"], from.church_id.to_string());

    // Without a clash the move goes through
    let (status, moved) = send(
        server,
        &root,
        Method::PUT,
        &format!("/api/users/{}", from.other_member.id),
        json!({ "church_id": to.church_id, "branch_id": to.branch_b }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["data"]["church_id"], to.church_id.to_string());
    assert_eq!(moved["data"]["branch_id"], to.branch_b.to_string());
    Ok(())
}

#[tokio::test]
async fn out_of_range_page_is_a_bad_request() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let (status, body) = get(s.server, &s.admin, &format!("/api/branches?page={}", i64::MAX)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn new_group_leader_becomes_a_member() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let (status, created) = send(
        s.server,
        &s.admin,
        Method::POST,
        "/api/small-groups",
        json!({ "branch_id": s.church.branch_a, "name": "Tuesday Study", "leader_id": s.church.pastor.id }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let path = format!("/api/small-groups/{}", created["data"]["id"].as_str().unwrap_or_default());

    let (status, body) = send(s.server, &s.admin, Method::PUT, &path, json!({ "leader_id": s.church.member.id })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["leader_id"], s.church.member.id.to_string());
    let members = body["data"]["member_ids"].as_array().cloned().unwrap_or_default();
    assert!(members.contains(&json!(s.church.member.id)));
    assert!(members.contains(&json!(s.church.pastor.id)));

    // Re-saving the same leader does not duplicate them
    let (_, body) = send(s.server, &s.admin, Method::PUT, &path, json!({ "leader_id": s.church.member.id })).await?;
    assert_eq!(body["data"]["member_ids"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn failed_update_leaves_row_untouched() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let path = format!("/api/users/{}", s.church.member.id);
    let (status, _) = send(
        s.server,
        &s.admin,
        Method::PUT,
        &path,
        json!({ "first_name": "Renamed", "email": s.church.pastor.email }),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(s.server, &s.admin, &path).await?;
    assert_eq!(body["data"]["first_name"], "member");
    assert_eq!(body["data"]["email"], s.church.member.email.as_str());
    Ok(())
}

#[tokio::test]
async fn soft_deleted_users_drop_out_until_restored() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let id = s.church.other_member.id;
    let path = format!("/api/users/{}", id);
    assert_eq!(send(s.server, &s.admin, Method::DELETE, &path, json!({})).await?.0, StatusCode::OK);
    assert_eq!(get(s.server, &s.admin, &path).await?.0, StatusCode::NOT_FOUND);

    let (_, listed) = get(s.server, &s.admin, "/api/users?search=other").await?;
    assert_eq!(listed["data"]["total"], 0);

    let (_, with_deleted) = get(s.server, &s.admin, "/api/users?search=other&include_deleted=true").await?;
    assert_eq!(with_deleted["data"]["total"], 1);

    let restore = format!("/api/users/{}/restore", id);
    assert_eq!(send(s.server, &s.admin, Method::POST, &restore, json!({})).await?.0, StatusCode::OK);
    assert_eq!(get(s.server, &s.admin, &path).await?.0, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn deleted_member_cannot_sign_in() -> Result<()> {
    let Some(s) = session().await? else { return Ok(()) };

    let path = format!("/api/users/{}", s.church.member.id);
    assert_eq!(send(s.server, &s.admin, Method::DELETE, &path, json!({})).await?.0, StatusCode::OK);

    // The old token no longer passes user validation
    assert_eq!(get(s.server, &s.member, "/api/auth/whoami").await?.0, StatusCode::UNAUTHORIZED);
    assert!(login(s.server, &s.church.member, &s.church.slug).await.is_err());
    Ok(())
}
